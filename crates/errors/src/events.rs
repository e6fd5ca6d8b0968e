//! Event delivery error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventError {
    #[error("listener {listener} failed: {message}")]
    ListenerFailed { listener: String, message: String },

    #[error("event channel closed")]
    ChannelClosed,
}

impl EventError {
    pub fn listener_failed(listener: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ListenerFailed {
            listener: listener.into(),
            message: message.into(),
        }
    }
}

impl UserFacingError for EventError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::ListenerFailed { .. } => "events.listener_failed",
            Self::ChannelClosed => "events.channel_closed",
        })
    }
}

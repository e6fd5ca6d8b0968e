use serde::{Deserialize, Serialize};
use shardex_types::SqlType;
use uuid::Uuid;

use super::FailureContext;

/// Operation-wide events bracketing one fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OperationEvent {
    /// Units are about to be dispatched
    Started {
        operation_id: Uuid,
        sql_type: SqlType,
        units: usize,
        strict: bool,
    },

    /// Every unit produced a result (present or absent)
    Completed {
        operation_id: Uuid,
        present: usize,
        absent: usize,
    },

    /// The operation was aborted
    Failed {
        operation_id: Uuid,
        failure: FailureContext,
    },
}

impl OperationEvent {
    #[must_use]
    pub fn operation_id(&self) -> Uuid {
        match self {
            Self::Started { operation_id, .. }
            | Self::Completed { operation_id, .. }
            | Self::Failed { operation_id, .. } => *operation_id,
        }
    }
}

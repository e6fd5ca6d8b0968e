use serde::{Deserialize, Serialize};

/// Outcome of one execution unit.
///
/// `Absent` marks a unit whose data-access failure was absorbed in lenient
/// mode; it is never produced in strict mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ExecutionResult<T> {
    Present(T),
    Absent,
}

impl<T> ExecutionResult<T> {
    #[must_use]
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    #[must_use]
    pub fn as_ref(&self) -> ExecutionResult<&T> {
        match self {
            Self::Present(value) => ExecutionResult::Present(value),
            Self::Absent => ExecutionResult::Absent,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ExecutionResult<U> {
        match self {
            Self::Present(value) => ExecutionResult::Present(f(value)),
            Self::Absent => ExecutionResult::Absent,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent => None,
        }
    }
}

impl<T> From<Option<T>> for ExecutionResult<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Self::Present)
    }
}

impl<T> From<ExecutionResult<T>> for Option<T> {
    fn from(result: ExecutionResult<T>) -> Self {
        result.into_option()
    }
}

use serde::{Deserialize, Serialize};
use shardex_types::{ExecutionUnit, ParameterSet, SqlType};
use uuid::Uuid;

use super::FailureContext;

/// Lifecycle stage of one (unit, parameter set) execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ExecutionStage {
    Started,
    Succeeded,
    Failed { failure: FailureContext },
}

/// One execution attempt of a statement against a physical data source.
///
/// Built in `Started` before the low-level call, moved to a terminal stage
/// afterwards. `id` stays the same across both emissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub id: Uuid,
    pub operation_id: Uuid,
    pub sql_type: SqlType,
    pub data_source: String,
    pub sql: String,
    pub parameters: ParameterSet,
    #[serde(flatten)]
    pub stage: ExecutionStage,
}

impl ExecutionEvent {
    #[must_use]
    pub fn started(
        operation_id: Uuid,
        sql_type: SqlType,
        unit: &ExecutionUnit,
        parameters: &ParameterSet,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation_id,
            sql_type,
            data_source: unit.data_source().to_string(),
            sql: unit.sql().to_string(),
            parameters: parameters.clone(),
            stage: ExecutionStage::Started,
        }
    }

    pub fn mark_succeeded(&mut self) {
        self.stage = ExecutionStage::Succeeded;
    }

    pub fn mark_failed(&mut self, failure: FailureContext) {
        self.stage = ExecutionStage::Failed { failure };
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self.stage, ExecutionStage::Started)
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.stage, ExecutionStage::Failed { .. })
    }
}

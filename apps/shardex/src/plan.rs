//! Plan files: data sources plus the routed units of one logical operation
//!
//! ```toml
//! strict = false
//!
//! [[data_source]]
//! name = "ds_0"
//! url = "sqlite::memory:"
//! init = ["CREATE TABLE t_order (order_id INTEGER PRIMARY KEY, status TEXT)"]
//!
//! [[unit]]
//! data_source = "ds_0"
//! sql = "INSERT INTO t_order (order_id, status) VALUES (?, ?)"
//! parameter_sets = [[1, "init"], [2, "init"]]
//!
//! [diagnostics]
//! trace_id = "c0ffee"
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use shardex_engine::ExecutionContext;
use shardex_types::{ExecutionUnit, SqlType};

use crate::error::CliError;

/// A physical data source the plan runs against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceSpec {
    pub name: String,
    /// sqlx connection URL
    pub url: String,
    /// Statements run once when the data source is opened
    #[serde(default)]
    pub init: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub strict: Option<bool>,

    #[serde(default)]
    pub sql_type: Option<SqlType>,

    #[serde(default, rename = "data_source")]
    pub data_sources: Vec<DataSourceSpec>,

    #[serde(default, rename = "unit")]
    pub units: Vec<ExecutionUnit>,

    #[serde(default)]
    pub diagnostics: HashMap<String, serde_json::Value>,
}

impl Plan {
    /// Read and validate a plan file
    pub async fn load(path: &Path) -> Result<Self, CliError> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            CliError::Plan(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, CliError> {
        let plan: Self = toml::from_str(contents).map_err(|e| CliError::Plan(e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    fn validate(&self) -> Result<(), CliError> {
        let mut names = HashSet::new();
        for source in &self.data_sources {
            if !names.insert(source.name.as_str()) {
                return Err(CliError::Plan(format!(
                    "data source {} is declared twice",
                    source.name
                )));
            }
        }

        for (index, unit) in self.units.iter().enumerate() {
            if !names.contains(unit.data_source()) {
                return Err(CliError::Plan(format!(
                    "unit {index} targets undeclared data source {}",
                    unit.data_source()
                )));
            }
            if unit.sql().trim().is_empty() {
                return Err(CliError::Plan(format!("unit {index} has no SQL")));
            }
        }
        Ok(())
    }

    /// Statement type of the operation, falling back to the first unit's SQL
    pub fn resolve_sql_type(&self, requested: Option<SqlType>) -> Result<SqlType, CliError> {
        requested
            .or(self.sql_type)
            .or_else(|| self.units.first().and_then(|unit| SqlType::classify(unit.sql())))
            .ok_or_else(|| {
                CliError::Plan("cannot infer the statement type; pass --sql-type".to_string())
            })
    }

    /// Operation context: explicit override, then the plan, then `default`
    pub fn context(&self, strict_override: Option<bool>, default: bool) -> ExecutionContext {
        ExecutionContext {
            strict_mode: strict_override.or(self.strict).unwrap_or(default),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

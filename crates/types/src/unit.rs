//! Physical execution units produced by the routing layer

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single bound statement parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "'{v}'"),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Parameters bound to one execution of a statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(Vec<ParameterValue>);

impl ParameterSet {
    #[must_use]
    pub fn new(values: Vec<ParameterValue>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn values(&self) -> &[ParameterValue] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<ParameterValue>> for ParameterSet {
    fn from(values: Vec<ParameterValue>) -> Self {
        Self(values)
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}

#[derive(Deserialize)]
struct SqlUnitRepr {
    sql: String,
    #[serde(default)]
    parameter_sets: Vec<ParameterSet>,
}

/// Rewritten SQL plus the parameter sets it runs with.
///
/// A statement without parameters still executes once, so an empty list of
/// parameter sets is normalised to a single empty set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SqlUnitRepr")]
pub struct SqlUnit {
    sql: String,
    parameter_sets: Vec<ParameterSet>,
}

impl SqlUnit {
    pub fn new(sql: impl Into<String>, parameter_sets: Vec<ParameterSet>) -> Self {
        let parameter_sets = if parameter_sets.is_empty() {
            vec![ParameterSet::default()]
        } else {
            parameter_sets
        };
        Self {
            sql: sql.into(),
            parameter_sets,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn parameter_sets(&self) -> &[ParameterSet] {
        &self.parameter_sets
    }
}

impl From<SqlUnitRepr> for SqlUnit {
    fn from(repr: SqlUnitRepr) -> Self {
        Self::new(repr.sql, repr.parameter_sets)
    }
}

/// One physical target of a logical operation: a data source and the SQL to
/// run against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionUnit {
    data_source: String,
    #[serde(flatten)]
    sql_unit: SqlUnit,
}

impl ExecutionUnit {
    pub fn new(data_source: impl Into<String>, sql_unit: SqlUnit) -> Self {
        Self {
            data_source: data_source.into(),
            sql_unit,
        }
    }

    #[must_use]
    pub fn data_source(&self) -> &str {
        &self.data_source
    }

    #[must_use]
    pub fn sql_unit(&self) -> &SqlUnit {
        &self.sql_unit
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        self.sql_unit.sql()
    }

    #[must_use]
    pub fn parameter_sets(&self) -> &[ParameterSet] {
        self.sql_unit.parameter_sets()
    }
}

impl fmt::Display for ExecutionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ::: {}", self.data_source, self.sql_unit.sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_parameter_sets_execute_once() {
        let unit = ExecutionUnit::new("ds_0", SqlUnit::new("DELETE FROM t_order", vec![]));
        assert_eq!(unit.parameter_sets().len(), 1);
        assert!(unit.parameter_sets()[0].is_empty());
    }

    #[test]
    fn deserialised_units_keep_the_same_invariant() {
        let unit: ExecutionUnit = serde_json::from_str(
            r#"{"data_source":"ds_1","sql":"SELECT 1"}"#,
        )
        .unwrap();
        assert_eq!(unit.data_source(), "ds_1");
        assert_eq!(unit.parameter_sets().len(), 1);
    }

    #[test]
    fn parameters_parse_from_toml() {
        let unit: ExecutionUnit = toml::from_str(
            r#"
data_source = "ds_0"
sql = "INSERT INTO t_order (order_id, status) VALUES (?, ?)"
parameter_sets = [[1, "init"], [2, "paid"]]
"#,
        )
        .unwrap();
        assert_eq!(unit.parameter_sets().len(), 2);
        assert_eq!(
            unit.parameter_sets()[1].values(),
            &[ParameterValue::Int(2), ParameterValue::Text("paid".into())]
        );
        assert_eq!(unit.parameter_sets()[0].to_string(), "[1, 'init']");
    }
}

//! SQLite data sources backing the CLI, driven through sqlx

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use shardex_engine::UnitExecutor;
use shardex_errors::{DataAccessError, DataAccessKind, UnitError};
use shardex_types::{ExecutionUnit, ParameterSet, ParameterValue, SqlType};
use sqlx::query::Query;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};
use tracing::{debug, info};

use crate::error::CliError;
use crate::plan::DataSourceSpec;

/// What one unit did against its data source
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatementOutcome {
    pub rows_affected: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<Value>,
}

/// Low-level executor holding one sqlx pool per data source
pub struct SqliteExecutor {
    pools: HashMap<String, SqlitePool>,
}

impl SqliteExecutor {
    /// Open every data source and run its init statements
    pub async fn connect(
        sources: &[DataSourceSpec],
        max_connections: u32,
    ) -> Result<Self, CliError> {
        let mut pools = HashMap::with_capacity(sources.len());
        for source in sources {
            // Each connection to an in-memory database is a separate database.
            let connections = if source.url.contains(":memory:") {
                1
            } else {
                max_connections.max(1)
            };
            let pool = SqlitePoolOptions::new()
                .max_connections(connections)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(&source.url)
                .await
                .map_err(|e| CliError::Setup(format!("{}: {e}", source.name)))?;

            for statement in &source.init {
                sqlx::query(statement)
                    .execute(&pool)
                    .await
                    .map_err(|e| CliError::Setup(format!("{}: {e}", source.name)))?;
            }
            info!(data_source = %source.name, connections, "data source ready");
            pools.insert(source.name.clone(), pool);
        }
        Ok(Self { pools })
    }

    /// Close every pool
    pub async fn close(&self) {
        for pool in self.pools.values() {
            pool.close().await;
        }
    }

    async fn run_unit(&self, unit: &ExecutionUnit) -> Result<StatementOutcome, UnitError> {
        let data_source = unit.data_source();
        let pool = self.pools.get(data_source).ok_or_else(|| {
            UnitError::contract(format!("no connection for data source {data_source}"))
        })?;
        let returns_rows = SqlType::classify(unit.sql()).is_some_and(SqlType::returns_rows);

        // All parameter sets of a unit commit or roll back together.
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| data_access_error(data_source, &e))?;
        let mut outcome = StatementOutcome::default();

        for parameters in unit.parameter_sets() {
            let query = bind(unit.sql(), parameters)?;
            if returns_rows {
                let rows = query
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(|e| data_access_error(data_source, &e))?;
                outcome.rows.extend(rows.iter().map(row_to_json));
            } else {
                let result = query
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| data_access_error(data_source, &e))?;
                outcome.rows_affected += result.rows_affected();
            }
        }

        tx.commit()
            .await
            .map_err(|e| data_access_error(data_source, &e))?;
        debug!(
            data_source,
            rows_affected = outcome.rows_affected,
            rows_returned = outcome.rows.len(),
            "unit executed"
        );
        Ok(outcome)
    }
}

impl UnitExecutor<StatementOutcome> for SqliteExecutor {
    fn execute(
        &self,
        unit: Arc<ExecutionUnit>,
    ) -> impl Future<Output = Result<StatementOutcome, UnitError>> + Send {
        async move { self.run_unit(&unit).await }
    }
}

fn bind<'q>(
    sql: &'q str,
    parameters: &'q ParameterSet,
) -> Result<Query<'q, Sqlite, <Sqlite as sqlx::Database>::Arguments<'q>>, UnitError> {
    let placeholders = count_placeholders(sql);
    if !parameters.is_empty() && placeholders != parameters.len() {
        return Err(UnitError::contract(format!(
            "statement has {placeholders} placeholders but {} parameters were supplied",
            parameters.len()
        )));
    }

    let mut query = sqlx::query(sql);
    for value in parameters.values() {
        query = match value {
            ParameterValue::Null => query.bind(Option::<i64>::None),
            ParameterValue::Bool(v) => query.bind(*v),
            ParameterValue::Int(v) => query.bind(*v),
            ParameterValue::Float(v) => query.bind(*v),
            ParameterValue::Text(v) => query.bind(v.as_str()),
        };
    }
    Ok(query)
}

/// Count `?` placeholders, skipping quoted literals and comments
fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '?' => count += 1,
            // Doubled quotes close and reopen, so escapes need no special case.
            '\'' | '"' | '`' => {
                for inner in chars.by_ref() {
                    if inner == c {
                        break;
                    }
                }
            }
            '[' => {
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for inner in chars.by_ref() {
                    if previous == '*' && inner == '/' {
                        break;
                    }
                    previous = inner;
                }
            }
            _ => {}
        }
    }
    count
}

fn row_to_json(row: &SqliteRow) -> Value {
    let mut object = Map::new();
    for column in row.columns() {
        let index = column.ordinal();
        let value = match row.try_get_raw(index) {
            Ok(raw) if !raw.is_null() => match raw.type_info().name() {
                "INTEGER" => row.try_get::<i64, _>(index).map_or(Value::Null, Value::from),
                "REAL" => row.try_get::<f64, _>(index).map_or(Value::Null, Value::from),
                "TEXT" => row.try_get::<String, _>(index).map_or(Value::Null, Value::from),
                other => Value::from(format!("<{}>", other.to_lowercase())),
            },
            _ => Value::Null,
        };
        object.insert(column.name().to_string(), value);
    }
    Value::Object(object)
}

/// Classify a driver error for the error-handling policy
pub fn data_access_error(data_source: &str, error: &sqlx::Error) -> DataAccessError {
    match error {
        sqlx::Error::Database(db) => {
            let kind = match db.kind() {
                sqlx::error::ErrorKind::UniqueViolation
                | sqlx::error::ErrorKind::ForeignKeyViolation
                | sqlx::error::ErrorKind::NotNullViolation
                | sqlx::error::ErrorKind::CheckViolation => DataAccessKind::Constraint,
                _ if db.message().contains("syntax error") => DataAccessKind::Syntax,
                _ => DataAccessKind::Other,
            };
            let failure = DataAccessError::new(data_source, kind, db.message());
            match db.code() {
                Some(code) => failure.with_sql_state(code),
                None => failure,
            }
        }
        sqlx::Error::PoolTimedOut => {
            DataAccessError::new(data_source, DataAccessKind::Timeout, error.to_string())
        }
        sqlx::Error::Io(_) | sqlx::Error::PoolClosed => {
            DataAccessError::new(data_source, DataAccessKind::Connectivity, error.to_string())
        }
        _ => DataAccessError::new(data_source, DataAccessKind::Other, error.to_string()),
    }
}

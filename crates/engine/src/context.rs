//! Operation-scoped execution context
//!
//! Each operation builds its own [`ExecutionContext`]. Workers bind it with
//! [`scope`] before running a unit, after which any code on that task,
//! including low-level executors that never receive it as an argument, can
//! read it through [`current_strict_mode`] and [`current_diagnostics`].
//!
//! Spawned tasks do not inherit the binding, so every worker binds the
//! context itself.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ErrorPolicy;

tokio::task_local! {
    static CURRENT: Arc<ExecutionContext>;
}

/// Per-operation state, immutable once the operation starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub strict_mode: bool,
    #[serde(default)]
    pub diagnostics: HashMap<String, Value>,
}

impl ExecutionContext {
    #[must_use]
    pub fn new(strict_mode: bool) -> Self {
        Self {
            strict_mode,
            diagnostics: HashMap::new(),
        }
    }

    /// Attach a diagnostic entry
    #[must_use]
    pub fn with_diagnostic(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.diagnostics.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn diagnostic(&self, key: &str) -> Option<&Value> {
        self.diagnostics.get(key)
    }

    /// Diagnostics flattened to strings for event labels
    #[must_use]
    pub fn diagnostic_labels(&self) -> BTreeMap<String, String> {
        self.diagnostics
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect()
    }

    #[must_use]
    pub fn policy(&self) -> ErrorPolicy {
        ErrorPolicy::from_strict_mode(self.strict_mode)
    }
}

/// Run `future` with `context` bound for the current task.
pub async fn scope<F>(context: Arc<ExecutionContext>, future: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(context, future).await
}

/// Run `f` with `context` bound for the current thread of execution.
pub fn sync_scope<R>(context: Arc<ExecutionContext>, f: impl FnOnce() -> R) -> R {
    CURRENT.sync_scope(context, f)
}

/// The bound context, if any.
#[must_use]
pub fn current() -> Option<Arc<ExecutionContext>> {
    CURRENT.try_with(Arc::clone).ok()
}

/// Strict flag of the bound context; `false` outside a bound scope.
#[must_use]
pub fn current_strict_mode() -> bool {
    CURRENT.try_with(|context| context.strict_mode).unwrap_or(false)
}

/// Diagnostics of the bound context; empty outside a bound scope.
#[must_use]
pub fn current_diagnostics() -> HashMap<String, Value> {
    CURRENT
        .try_with(|context| context.diagnostics.clone())
        .unwrap_or_default()
}

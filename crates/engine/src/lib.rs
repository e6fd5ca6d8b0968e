#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Parallel multi-shard statement execution for shardex
//!
//! Given the physical execution units of one logical operation, the
//! [`ExecutorEngine`] runs them concurrently on a bounded worker pool,
//! binds the operation's [`ExecutionContext`] inside every worker,
//! publishes lifecycle events on the injected bus, and applies the
//! [`ErrorPolicy`] to unit failures.
//!
//! ```text
//! Vec<ExecutionUnit> -> ExecutorEngine::run_all
//!                         -> ExecuteCallback x N (pool workers)
//!                              -> UnitExecutor (caller supplied)
//!                    <- Vec<ExecutionResult<T>> (input order)
//! ```

pub mod callback;
pub mod context;
pub mod coordinator;
pub mod executor;
pub mod policy;
pub mod result;

pub use callback::ExecuteCallback;
pub use context::{current_diagnostics, current_strict_mode, ExecutionContext};
pub use coordinator::ExecutorEngine;
pub use executor::UnitExecutor;
pub use policy::ErrorPolicy;
pub use result::ExecutionResult;

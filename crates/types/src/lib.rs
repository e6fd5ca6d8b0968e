#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the shardex execution engine
//!
//! This crate provides the immutable inputs handed over by the routing layer:
//! execution units, the SQL they carry, and their parameter sets.

pub mod sql;
pub mod unit;

// Re-export commonly used types
pub use sql::SqlType;
pub use unit::{ExecutionUnit, ParameterSet, ParameterValue, SqlUnit};

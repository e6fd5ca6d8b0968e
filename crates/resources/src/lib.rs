#![deny(clippy::pedantic, unsafe_code)]

//! Resource management utilities for shardex
//!
//! This crate provides the bounded worker pool that caps how many execution
//! units, and therefore physical connections, are in use at once.

pub mod limits;
pub mod pool;
pub mod semaphore;

pub use limits::{IntoPoolLimits, PoolAvailability, PoolLimits};
pub use pool::{WorkerPermit, WorkerPool};
pub use semaphore::{acquire_semaphore_permit, create_semaphore, try_acquire_semaphore_permit};

//! # Execution Engine
//!
//! Runs a list of [`JobDescriptor`](crate::job::JobDescriptor)s either one at a
//! time ([`run_sequential`]) or on a fixed-size pool of OS threads
//! ([`WorkerPool`], [`run_parallel`]).
//!
//! ## Guarantees
//!
//! - Sequential results come back in job order.
//! - Parallel results come back in completion order; callers that need a
//!   deterministic order sort afterwards (see [`crate::aggregate`]).
//! - The first failing job fails the whole batch. No retries, no partial
//!   results.
//! - The pool is created per batch and every worker thread is joined before
//!   the call returns, on the success path and on the failure path alike.

pub mod expand;
pub mod monitor;
pub mod pool;
pub mod sequential;

pub use expand::expand_call;
pub use monitor::PoolMonitor;
pub use pool::{run_parallel, WorkerPool};
pub use sequential::run_sequential;

/// Which engine a batch runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Parallel { num_workers: usize },
}

impl ExecutionMode {
    /// Sequential for a single worker, parallel otherwise
    pub fn for_workers(num_workers: usize) -> Self {
        if num_workers <= 1 {
            Self::Sequential
        } else {
            Self::Parallel { num_workers }
        }
    }

    pub fn num_workers(&self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Parallel { num_workers } => *num_workers,
        }
    }
}

//! # Dispatch Error Types
//!
//! Structured error handling for partition planning, job invocation, batch
//! execution and result merging, using thiserror instead of `Box<dyn Error>`.

use std::ops::Range;
use thiserror::Error;

/// Every failure surfaced by a dispatch batch
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Invalid partition: {num_atoms} atoms over {num_workers} workers: {reason}")]
    InvalidPartition {
        num_atoms: usize,
        num_workers: usize,
        reason: String,
    },

    #[error("Signature mismatch for task {task}: missing {missing:?}, unexpected {unexpected:?}")]
    SignatureMismatch {
        task: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("Argument {name} of task {task} is not a valid {expected}: {message}")]
    ArgumentType {
        task: String,
        name: String,
        expected: &'static str,
        message: String,
    },

    #[error("Job {job} of task {task} failed on atoms {range:?}: {source}")]
    JobFailed {
        task: String,
        job: usize,
        range: Range<usize>,
        #[source]
        source: anyhow::Error,
    },

    #[error("Job {job} of task {task} panicked: {message}")]
    JobPanicked {
        task: String,
        job: usize,
        message: String,
    },

    #[error("Cannot merge heterogeneous outputs: expected {expected}, found {found} at position {position}")]
    HeterogeneousOutputs {
        expected: &'static str,
        found: &'static str,
        position: usize,
    },

    #[error("Row has {found} values but the frame has {expected} columns")]
    RowWidth { expected: usize, found: usize },

    #[error("Argument {name} of task {task} shadows the molecule key")]
    ShadowedMoleculeKey { task: String, name: String },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DispatchError {
    /// Shorthand for partition validation failures
    pub fn invalid_partition(num_atoms: usize, num_workers: usize, reason: impl Into<String>) -> Self {
        Self::InvalidPartition {
            num_atoms,
            num_workers,
            reason: reason.into(),
        }
    }

    /// True for errors raised by a job body rather than by the dispatcher itself
    pub fn is_job_failure(&self) -> bool {
        matches!(self, Self::JobFailed { .. } | Self::JobPanicked { .. })
    }
}

impl From<config::ConfigError> for DispatchError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Molecule Dispatch
//!
//! Work partitioning and parallel dispatch for large indexed collections.
//!
//! ## Overview
//!
//! A batch is a collection of **atoms** (anything indexable) and a
//! **molecule task**: a function that processes a contiguous slice of atoms
//! (a **molecule**) at a time. The crate splits the atoms into balanced
//! molecules, runs the task on each molecule using a fixed-size pool of OS
//! threads, reports live progress and merges the per-molecule results back
//! into one result ordered by atom label.
//!
//! ## Module Organization
//!
//! - [`partition`] - Uniform and load-weighted (triangular) partition plans
//! - [`job`] - Job descriptors, named arguments and the [`MoleculeTask`] trait
//! - [`execution`] - Callback expansion, sequential runner and worker pool
//! - [`progress`] - Progress reporting on a diagnostic stream
//! - [`frame`] - Labeled series and row-indexed frames returned by tasks
//! - [`aggregate`] - Partition → execute → merge orchestration
//! - [`config`] - Layered configuration (file + environment)
//! - [`logging`] - `tracing` subscriber setup
//! - [`error`] - Structured error handling
//! - [`workloads`] - Reference workloads used by benchmarks and tests
//!
//! ## Quick Start
//!
//! ```rust
//! use molecule_dispatch::{Aggregator, ChunkOutput, FnTask, Invocation, Series};
//!
//! let task = FnTask::new("double", ["molecule"], |inv: &Invocation<'_, u64>| {
//!     let doubled: Series<usize, u64> = inv
//!         .molecule()
//!         .indexed()
//!         .map(|(index, atom)| (index, atom * 2))
//!         .collect();
//!     Ok(ChunkOutput::Series(doubled))
//! });
//!
//! let items: Vec<u64> = (0..6).collect();
//! let merged = Aggregator::new(task)
//!     .num_workers(2)
//!     .progress(None)
//!     .run(&items)
//!     .unwrap();
//!
//! let series = merged.into_series().unwrap();
//! assert_eq!(series.get(&5), Some(&10));
//! ```
//!
//! ## Failure Semantics
//!
//! One failing job fails the whole batch: no retries, no partial results.
//! The worker pool is torn down before the batch call returns either way.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod execution;
pub mod frame;
pub mod job;
pub mod logging;
pub mod partition;
pub mod progress;
pub mod workloads;

pub use aggregate::{aggregate, merge_outputs, Aggregator};
pub use config::DispatchConfig;
pub use error::{DispatchError, Result};
pub use execution::{expand_call, run_parallel, run_sequential, ExecutionMode, PoolMonitor, WorkerPool};
pub use frame::{ChunkOutput, Frame, Merged, Series, ShapeCategory};
pub use job::{build_jobs, FnTask, Invocation, JobDescriptor, KwArgs, Molecule, MoleculeTask};
pub use partition::{uniform_partition, weighted_partition, PartitionPlan, PartitionStrategy};
pub use progress::{report_progress, ExecutionReport, ProgressReporter, ProgressSink};

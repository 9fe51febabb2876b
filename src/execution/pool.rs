//! Fixed-size worker pool for one batch.
//!
//! Jobs go in through a crossbeam channel, results come out through another,
//! tagged with their job index, in whatever order the workers finish them.
//! Workers run inside a `crossbeam::thread::scope`, so none of them can
//! outlive the call that created the pool.

use super::expand::expand_call;
use super::monitor::PoolMonitor;
use crate::error::{DispatchError, Result};
use crate::job::{JobDescriptor, MoleculeTask};
use crate::progress::{ProgressReporter, ProgressSink};
use crossbeam::channel;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, error, info};

/// Per-batch pool configuration
#[derive(Debug, Clone)]
pub struct WorkerPool {
    num_workers: usize,
    task_label: Option<String>,
    progress: Option<ProgressSink>,
    monitor: PoolMonitor,
}

impl WorkerPool {
    /// Pool of `num_workers` units reporting progress to stderr
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers: num_workers.max(1),
            task_label: None,
            progress: Some(ProgressSink::stderr()),
            monitor: PoolMonitor::new(),
        }
    }

    /// Label used in progress lines; defaults to the task's name
    pub fn with_task_label(mut self, label: impl Into<String>) -> Self {
        self.task_label = Some(label.into());
        self
    }

    /// `None` disables progress lines
    pub fn with_progress(mut self, sink: Option<ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    pub fn with_monitor(mut self, monitor: PoolMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn monitor(&self) -> &PoolMonitor {
        &self.monitor
    }

    /// Runs every job and returns the outputs in completion order.
    ///
    /// On the first failed job the remaining queued jobs are abandoned, jobs
    /// already running finish, every worker is joined, and the failure is
    /// returned.
    pub fn run<'a, F, T>(&self, jobs: Vec<JobDescriptor<'a, F, T>>) -> Result<Vec<F::Output>>
    where
        F: MoleculeTask<T> + ?Sized,
        T: Sync,
    {
        let total = jobs.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let label = self
            .task_label
            .clone()
            .unwrap_or_else(|| jobs[0].task_name().to_string());
        let units = self.num_workers.min(total);
        let started = Instant::now();

        info!(task = %label, jobs = total, workers = units, "Starting worker pool");

        let (job_tx, job_rx) = channel::unbounded::<JobDescriptor<'a, F, T>>();
        for job in jobs {
            job_tx
                .send(job)
                .map_err(|_| DispatchError::WorkerPool("job queue closed before dispatch".into()))?;
        }
        drop(job_tx);

        let (result_tx, result_rx) = channel::unbounded::<(usize, Result<F::Output>)>();
        let halted = AtomicBool::new(false);
        let reporter = self
            .progress
            .clone()
            .map(|sink| ProgressReporter::new(label.clone(), total, sink));

        let scoped = crossbeam::thread::scope(|scope| -> Result<Vec<F::Output>> {
            for unit in 0..units {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let halted = &halted;
                let monitor = &self.monitor;

                let spawned = scope
                    .builder()
                    .name(format!("molecule-worker-{unit}"))
                    .spawn(move |_| {
                        let _unit = monitor.enter();
                        while !halted.load(Ordering::Acquire) {
                            let Ok(job) = job_rx.recv() else { break };
                            let index = job.index();
                            if result_tx.send((index, expand_call(job))).is_err() {
                                break;
                            }
                        }
                    });

                if let Err(e) = spawned {
                    halted.store(true, Ordering::Release);
                    return Err(DispatchError::WorkerPool(format!(
                        "failed to spawn worker {unit}: {e}"
                    )));
                }
            }
            drop(result_tx);

            let mut outputs = Vec::with_capacity(total);
            for (index, result) in result_rx.iter() {
                match result {
                    Ok(output) => {
                        outputs.push(output);
                        debug!(task = %label, job = index, completed = outputs.len(), total, "Job completed");
                        if let Some(reporter) = &reporter {
                            reporter.report(outputs.len());
                        }
                    }
                    Err(e) => {
                        halted.store(true, Ordering::Release);
                        error!(task = %label, job = index, error = %e, "Job failed, abandoning batch");
                        return Err(e);
                    }
                }
                if outputs.len() == total {
                    break;
                }
            }

            if outputs.len() < total {
                return Err(DispatchError::WorkerPool(format!(
                    "workers exited after {} of {} jobs",
                    outputs.len(),
                    total
                )));
            }
            Ok(outputs)
        });

        let outcome = scoped.map_err(|_| DispatchError::WorkerPool("worker thread panicked".into()))?;

        info!(
            task = %label,
            jobs = total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            success = outcome.is_ok(),
            "Worker pool released"
        );
        outcome
    }
}

/// Runs `jobs` on a fresh pool of `num_workers` units, progress on stderr
pub fn run_parallel<F, T>(
    jobs: Vec<JobDescriptor<'_, F, T>>,
    num_workers: usize,
    task_label: Option<&str>,
) -> Result<Vec<F::Output>>
where
    F: MoleculeTask<T> + ?Sized,
    T: Sync,
{
    let mut pool = WorkerPool::new(num_workers);
    if let Some(label) = task_label {
        pool = pool.with_task_label(label);
    }
    pool.run(jobs)
}

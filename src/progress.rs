//! # Progress Reporter
//!
//! Human-facing status line for a running batch: percentage done, elapsed
//! minutes and an estimate of the minutes remaining. Lines overwrite each
//! other in place (`\r`) until the final job, which ends the line (`\n`).
//!
//! Reporting is an observer only; write failures are logged and swallowed.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Snapshot of batch progress after one completion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionReport {
    pub jobs_completed: usize,
    pub total_jobs: usize,
    pub elapsed: Duration,
}

impl ExecutionReport {
    pub fn fraction_done(&self) -> f64 {
        if self.total_jobs == 0 {
            return 1.0;
        }
        self.jobs_completed as f64 / self.total_jobs as f64
    }

    pub fn elapsed_minutes(&self) -> f64 {
        self.elapsed.as_secs_f64() / 60.0
    }

    /// `elapsed * (1 / fraction - 1)`; infinite before the first completion
    pub fn eta_minutes(&self) -> f64 {
        let fraction = self.fraction_done();
        if fraction <= 0.0 {
            return f64::INFINITY;
        }
        self.elapsed_minutes() * (1.0 / fraction - 1.0)
    }

    pub fn is_final(&self) -> bool {
        self.jobs_completed >= self.total_jobs
    }

    /// Status line without its terminator
    pub fn render(&self, timestamp: DateTime<Local>, task: &str) -> String {
        format!(
            "{} {:.2}% {} done after {:.2} minutes. Remaining {:.2} minutes.",
            timestamp.format("%Y-%m-%d %H:%M:%S%.6f"),
            self.fraction_done() * 100.0,
            task,
            self.elapsed_minutes(),
            self.eta_minutes(),
        )
    }
}

enum SinkTarget {
    Stderr,
    Memory(Vec<u8>),
    Writer(Box<dyn Write + Send>),
}

/// Destination of progress lines, shareable across batches
#[derive(Clone)]
pub struct ProgressSink {
    target: Arc<Mutex<SinkTarget>>,
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &*self.target.lock() {
            SinkTarget::Stderr => "stderr",
            SinkTarget::Memory(_) => "memory",
            SinkTarget::Writer(_) => "writer",
        };
        f.debug_struct("ProgressSink").field("target", &kind).finish()
    }
}

impl Default for ProgressSink {
    fn default() -> Self {
        Self::stderr()
    }
}

impl ProgressSink {
    fn new(target: SinkTarget) -> Self {
        Self {
            target: Arc::new(Mutex::new(target)),
        }
    }

    pub fn stderr() -> Self {
        Self::new(SinkTarget::Stderr)
    }

    /// Captures lines in memory; read them back with [`ProgressSink::contents`]
    pub fn memory() -> Self {
        Self::new(SinkTarget::Memory(Vec::new()))
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self::new(SinkTarget::Writer(Box::new(writer)))
    }

    /// Captured output of a memory sink, `None` for other targets
    pub fn contents(&self) -> Option<String> {
        match &*self.target.lock() {
            SinkTarget::Memory(buf) => Some(String::from_utf8_lossy(buf).into_owned()),
            _ => None,
        }
    }

    fn write_line(&self, line: &str, terminator: char) -> io::Result<()> {
        let mut target = self.target.lock();
        match &mut *target {
            SinkTarget::Stderr => {
                let mut stderr = io::stderr().lock();
                write!(stderr, "{line}{terminator}")?;
                stderr.flush()
            }
            SinkTarget::Memory(buf) => write!(buf, "{line}{terminator}"),
            SinkTarget::Writer(writer) => {
                write!(writer, "{line}{terminator}")?;
                writer.flush()
            }
        }
    }
}

/// Writes one status line describing `job_num` of `num_jobs` completions
pub fn report_progress(
    job_num: usize,
    num_jobs: usize,
    started: Instant,
    task: &str,
    sink: &ProgressSink,
) -> ExecutionReport {
    let report = ExecutionReport {
        jobs_completed: job_num,
        total_jobs: num_jobs,
        elapsed: started.elapsed(),
    };
    let line = report.render(Local::now(), task);
    let terminator = if report.is_final() { '\n' } else { '\r' };

    if let Err(e) = sink.write_line(&line, terminator) {
        warn!(task = %task, error = %e, "Failed to write progress line");
    }
    debug!(
        task = %task,
        completed = job_num,
        total = num_jobs,
        eta_minutes = report.eta_minutes(),
        "Batch progress"
    );
    report
}

/// Per-batch progress state, passed explicitly instead of living in globals
#[derive(Debug)]
pub struct ProgressReporter {
    task: String,
    total_jobs: usize,
    started: Instant,
    sink: ProgressSink,
}

impl ProgressReporter {
    pub fn new(task: impl Into<String>, total_jobs: usize, sink: ProgressSink) -> Self {
        Self {
            task: task.into(),
            total_jobs,
            started: Instant::now(),
            sink,
        }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn report(&self, jobs_completed: usize) -> ExecutionReport {
        report_progress(
            jobs_completed,
            self.total_jobs,
            self.started,
            &self.task,
            &self.sink,
        )
    }
}

//! # Result Aggregator
//!
//! Partition → job descriptors → execution → merge, in one call.
//!
//! The merge step looks at the first output's shape: frames are stacked
//! row-wise, series are concatenated, and both are sorted by label so that
//! the parallel engine's completion order never leaks into the result.
//! Opaque outputs are handed back as the raw list of per-job outputs.

use crate::config::DispatchConfig;
use crate::error::{DispatchError, Result};
use crate::execution::{run_sequential, ExecutionMode, PoolMonitor, WorkerPool};
use crate::frame::{ChunkOutput, Frame, Merged, Series, ShapeCategory};
use crate::job::{build_jobs, KwArgs, MoleculeTask};
use crate::logging::log_batch_operation;
use crate::partition::PartitionStrategy;
use crate::progress::ProgressSink;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span};
use uuid::Uuid;

pub const DEFAULT_MOLECULE_KEY: &str = "molecule";

/// Builder for one molecule task's batches
#[derive(Debug)]
pub struct Aggregator<F> {
    task: Arc<F>,
    molecule_key: String,
    num_workers: usize,
    batches_per_worker: usize,
    strategy: PartitionStrategy,
    kwargs: KwArgs,
    task_label: Option<String>,
    progress: Option<ProgressSink>,
    monitor: PoolMonitor,
}

impl<F> Aggregator<F> {
    pub fn new(task: F) -> Self {
        Self::from_shared(Arc::new(task))
    }

    pub fn from_shared(task: Arc<F>) -> Self {
        Self {
            task,
            molecule_key: DEFAULT_MOLECULE_KEY.to_string(),
            num_workers: 1,
            batches_per_worker: 1,
            strategy: PartitionStrategy::Uniform,
            kwargs: KwArgs::new(),
            task_label: None,
            progress: Some(ProgressSink::stderr()),
            monitor: PoolMonitor::new(),
        }
    }

    /// Applies worker count, batching, partitioning, molecule key, label and
    /// progress settings from a loaded configuration
    pub fn from_config(task: F, config: &DispatchConfig) -> Self {
        let mut aggregator = Self::new(task)
            .molecule_key(config.molecule_key.clone())
            .num_workers(config.num_workers)
            .batches_per_worker(config.batches_per_worker)
            .strategy(config.partition_strategy());
        if let Some(label) = &config.task_label {
            aggregator = aggregator.task_label(label.clone());
        }
        if !config.report_progress {
            aggregator = aggregator.progress(None);
        }
        aggregator
    }

    pub fn molecule_key(mut self, key: impl Into<String>) -> Self {
        self.molecule_key = key.into();
        self
    }

    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    pub fn batches_per_worker(mut self, batches: usize) -> Self {
        self.batches_per_worker = batches;
        self
    }

    pub fn strategy(mut self, strategy: PartitionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Uniform when `true`, light-first weighted otherwise
    pub fn uniform(self, use_uniform: bool) -> Self {
        self.strategy(if use_uniform {
            PartitionStrategy::Uniform
        } else {
            PartitionStrategy::Weighted { heavy_first: false }
        })
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.kwargs.insert(name, value);
        self
    }

    pub fn args(mut self, kwargs: KwArgs) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn task_label(mut self, label: impl Into<String>) -> Self {
        self.task_label = Some(label.into());
        self
    }

    /// `None` silences progress lines
    pub fn progress(mut self, sink: Option<ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    pub fn monitor(mut self, monitor: PoolMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn pool_monitor(&self) -> &PoolMonitor {
        &self.monitor
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::for_workers(self.num_workers)
    }

    /// Runs the task over `items` and returns the per-job outputs unmerged.
    ///
    /// Sequential runs keep job order; parallel runs return completion order.
    pub fn dispatch<T>(&self, items: &[T]) -> Result<Vec<F::Output>>
    where
        F: MoleculeTask<T>,
        T: Sync,
    {
        if self.num_workers == 0 || self.batches_per_worker == 0 {
            return Err(DispatchError::invalid_partition(
                items.len(),
                self.num_workers.saturating_mul(self.batches_per_worker),
                "num_workers and batches_per_worker must be positive",
            ));
        }
        if self.kwargs.contains(&self.molecule_key) {
            return Err(DispatchError::ShadowedMoleculeKey {
                task: self.task.name().to_string(),
                name: self.molecule_key.clone(),
            });
        }

        let batch_id = Uuid::new_v4();
        let span = info_span!("dispatch", %batch_id, task = %self.task.name());
        let _entered = span.enter();

        let target = self.num_workers.saturating_mul(self.batches_per_worker);
        let plan = self.strategy.plan(items.len(), target)?;
        let jobs = build_jobs(&*self.task, &self.molecule_key, items, &plan, &self.kwargs);
        let mode = self.execution_mode();
        let started = Instant::now();

        info!(
            atoms = items.len(),
            molecules = plan.num_molecules(),
            strategy = self.strategy.name(),
            mode = ?mode,
            "Dispatching batch"
        );

        let result = match mode {
            ExecutionMode::Sequential => run_sequential(jobs),
            ExecutionMode::Parallel { num_workers } => {
                let mut pool = WorkerPool::new(num_workers)
                    .with_progress(self.progress.clone())
                    .with_monitor(self.monitor.clone());
                if let Some(label) = &self.task_label {
                    pool = pool.with_task_label(label.clone());
                }
                pool.run(jobs)
            }
        };

        let details = format!("elapsed_ms={}", started.elapsed().as_millis());
        match &result {
            Ok(_) => log_batch_operation(
                "dispatch",
                self.task.name(),
                Some(plan.num_molecules()),
                "completed",
                Some(&details),
            ),
            Err(e) => log_batch_operation(
                "dispatch",
                self.task.name(),
                Some(plan.num_molecules()),
                "failed",
                Some(&format!("{details} error={e}")),
            ),
        }
        result
    }

    /// Runs the task over `items` and merges the outputs into one result
    pub fn run<T, K, V>(&self, items: &[T]) -> Result<Merged<K, V>>
    where
        F: MoleculeTask<T, Output = ChunkOutput<K, V>>,
        T: Sync,
        K: Ord + Send,
        V: Send,
    {
        merge_outputs(self.dispatch(items)?)
    }

    /// [`Aggregator::run`] on tokio's blocking thread pool
    pub async fn run_async<T, K, V>(self, items: Arc<[T]>) -> Result<Merged<K, V>>
    where
        F: MoleculeTask<T, Output = ChunkOutput<K, V>> + 'static,
        T: Send + Sync + 'static,
        K: Ord + Send + 'static,
        V: Send + 'static,
    {
        tokio::task::spawn_blocking(move || self.run(&items))
            .await
            .map_err(|e| DispatchError::WorkerPool(format!("blocking batch task failed: {e}")))?
    }
}

/// One-call form of [`Aggregator`]: partition `items` into
/// `num_workers * batches_per_worker` molecules, run `task` over them and
/// merge the outputs.
#[allow(clippy::too_many_arguments)]
pub fn aggregate<F, T, K, V>(
    task: F,
    molecule_key: &str,
    items: &[T],
    num_workers: usize,
    batches_per_worker: usize,
    use_uniform: bool,
    extra_args: KwArgs,
) -> Result<Merged<K, V>>
where
    F: MoleculeTask<T, Output = ChunkOutput<K, V>>,
    T: Sync,
    K: Ord + Send,
    V: Send,
{
    Aggregator::new(task)
        .molecule_key(molecule_key)
        .num_workers(num_workers)
        .batches_per_worker(batches_per_worker)
        .uniform(use_uniform)
        .args(extra_args)
        .run(items)
}

/// Merges per-job outputs according to the first output's shape.
///
/// Frames and series must not be mixed with other shapes; opaque outputs are
/// returned unmerged in the order given. Frame and series chunks are stacked
/// in order of their lowest label before the final sort, so the merged
/// columns and the order of equal labels match a sequential run whatever
/// order the chunks arrive in. Labels are expected to be unique across
/// chunks; duplicates within one chunk keep that chunk's order.
pub fn merge_outputs<K: Ord, V>(outputs: Vec<ChunkOutput<K, V>>) -> Result<Merged<K, V>> {
    let Some(first) = outputs.first() else {
        return Ok(Merged::Raw(outputs));
    };

    match first.category() {
        ShapeCategory::Opaque => Ok(Merged::Raw(outputs)),
        ShapeCategory::Frame => {
            let mut frames = Vec::with_capacity(outputs.len());
            for (position, output) in outputs.into_iter().enumerate() {
                match output {
                    ChunkOutput::Frame(frame) => frames.push(frame),
                    other => return Err(heterogeneous(ShapeCategory::Frame, &other, position)),
                }
            }
            frames.sort_by(|a, b| {
                by_lowest_label(a.lowest_label(), b.lowest_label())
                    .then_with(|| a.columns().cmp(b.columns()))
            });

            let mut merged = Frame::default();
            for frame in frames {
                merged.concat(frame);
            }
            Ok(Merged::Frame(merged.sort_index()))
        }
        ShapeCategory::Series => {
            let mut chunks = Vec::with_capacity(outputs.len());
            for (position, output) in outputs.into_iter().enumerate() {
                match output {
                    ChunkOutput::Series(series) => chunks.push(series),
                    other => return Err(heterogeneous(ShapeCategory::Series, &other, position)),
                }
            }
            chunks.sort_by(|a, b| by_lowest_label(a.lowest_label(), b.lowest_label()));

            let mut merged = Series::new();
            for series in chunks {
                merged.concat(series);
            }
            Ok(Merged::Series(merged.sort_index()))
        }
    }
}

/// Empty chunks sort last so they never lead the column order
fn by_lowest_label<K: Ord>(a: Option<&K>, b: Option<&K>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn heterogeneous<K, V>(expected: ShapeCategory, found: &ChunkOutput<K, V>, position: usize) -> DispatchError {
    DispatchError::HeterogeneousOutputs {
        expected: expected.name(),
        found: found.category().name(),
        position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{FnTask, Invocation};

    fn doubler() -> impl MoleculeTask<u64, Output = ChunkOutput<u64, u64>> {
        FnTask::new("double", ["molecule"], |inv: &Invocation<'_, u64>| {
            let series: Series<u64, u64> = inv.molecule().atoms().iter().map(|&i| (i, i * 2)).collect();
            Ok(ChunkOutput::Series(series))
        })
    }

    #[test]
    fn test_series_example() {
        let items: Vec<u64> = (0..6).collect();
        let merged = Aggregator::new(doubler())
            .num_workers(2)
            .progress(None)
            .run(&items)
            .unwrap();

        let series = merged.into_series().unwrap();
        assert_eq!(
            series.into_entries(),
            vec![(0, 0), (1, 2), (2, 4), (3, 6), (4, 8), (5, 10)]
        );
    }

    #[test]
    fn test_merge_restores_label_order() {
        let chunks: Vec<ChunkOutput<u64, u64>> = vec![
            Series::from_iter([(3, 6), (4, 8)]).into(),
            Series::from_iter([(0, 0), (1, 2), (2, 4)]).into(),
        ];
        let merged = merge_outputs(chunks).unwrap().into_series().unwrap();
        assert_eq!(merged.labels().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_opaque_outputs_stay_raw() {
        let chunks: Vec<ChunkOutput<u64, u64>> = vec![
            ChunkOutput::Opaque(serde_json::json!({"b": 1})),
            ChunkOutput::Opaque(serde_json::json!({"a": 2})),
        ];
        let raw = merge_outputs(chunks.clone()).unwrap().into_raw().unwrap();
        assert_eq!(raw, chunks);
    }

    #[test]
    fn test_mixed_shapes_are_rejected() {
        let chunks: Vec<ChunkOutput<u64, u64>> = vec![
            Series::from_iter([(0, 0)]).into(),
            Frame::with_columns(["x"]).into(),
        ];
        assert!(matches!(
            merge_outputs(chunks),
            Err(DispatchError::HeterogeneousOutputs {
                expected: "series",
                found: "frame",
                position: 1
            })
        ));
    }

    #[test]
    fn test_frame_merge_ignores_arrival_order() {
        let mut first: Frame<u64, f64> = Frame::with_columns(["x", "y"]);
        first.push_row(0, vec![1.0, 2.0]).unwrap();
        let mut second: Frame<u64, f64> = Frame::with_columns(["y", "z"]);
        second.push_row(1, vec![3.0, 4.0]).unwrap();

        let in_order = merge_outputs(vec![first.clone().into(), second.clone().into()]).unwrap();
        let reversed = merge_outputs(vec![second.into(), first.into()]).unwrap();
        assert_eq!(in_order, reversed);

        let frame = in_order.into_frame().unwrap();
        assert_eq!(frame.columns(), &["x", "y", "z"]);
        assert_eq!(frame.row(1).unwrap().1, &[None, Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_empty_frames_do_not_lead_columns() {
        let mut rows: Frame<u64, f64> = Frame::with_columns(["a"]);
        rows.push_row(3, vec![1.0]).unwrap();
        let empty: Frame<u64, f64> = Frame::with_columns(["b"]);

        let merged = merge_outputs(vec![empty.into(), rows.into()])
            .unwrap()
            .into_frame()
            .unwrap();
        assert_eq!(merged.columns(), &["a", "b"]);
    }

    #[test]
    fn test_equal_labels_follow_chunk_labels() {
        let low: Series<u64, u64> = Series::from_iter([(0, 10), (5, 11)]);
        let high: Series<u64, u64> = Series::from_iter([(5, 20), (6, 21)]);

        let forward = merge_outputs(vec![low.clone().into(), high.clone().into()]).unwrap();
        let backward = merge_outputs(vec![high.into(), low.into()]).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(
            forward.into_series().unwrap().into_entries(),
            vec![(0, 10), (5, 11), (5, 20), (6, 21)]
        );
    }

    #[test]
    fn test_argument_shadowing_molecule_key_rejected() {
        let items: Vec<u64> = (0..6).collect();
        let result = Aggregator::new(doubler())
            .num_workers(2)
            .progress(None)
            .args(KwArgs::new().with("molecule", "oops"))
            .run(&items);
        assert!(matches!(
            result,
            Err(DispatchError::ShadowedMoleculeKey { ref name, .. }) if name == "molecule"
        ));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let items: Vec<u64> = (0..6).collect();
        let result = Aggregator::new(doubler()).num_workers(0).run(&items);
        assert!(matches!(result, Err(DispatchError::InvalidPartition { .. })));
    }

    #[test]
    fn test_weighted_strategy_covers_all_atoms() {
        let items: Vec<u64> = (0..50).collect();
        let merged = Aggregator::new(doubler())
            .num_workers(3)
            .batches_per_worker(2)
            .uniform(false)
            .progress(None)
            .run(&items)
            .unwrap()
            .into_series()
            .unwrap();
        assert_eq!(merged.len(), 50);
        assert_eq!(merged.get(&49), Some(&98));
    }
}

//! # Dispatch Configuration
//!
//! Layered configuration for batch dispatch: built-in defaults, then an
//! optional file (TOML, YAML or JSON, picked by extension), then environment
//! variables prefixed with `MOLECULE_DISPATCH_`.
//!
//! ```rust,no_run
//! use molecule_dispatch::config::DispatchConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DispatchConfig::load(Some("config/dispatch.toml"))?;
//! println!("dispatching on {} workers", config.num_workers);
//! # Ok(())
//! # }
//! ```

use crate::error::{DispatchError, Result};
use crate::partition::PartitionStrategy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const ENV_PREFIX: &str = "MOLECULE_DISPATCH";

/// Partition policy name as it appears in configuration sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionKind {
    #[default]
    Uniform,
    Weighted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Size of the worker pool; `1` runs batches sequentially
    pub num_workers: usize,
    /// Molecules per worker; more molecules smooth out uneven job costs
    pub batches_per_worker: usize,
    pub partition: PartitionKind,
    /// Only meaningful with the weighted partition
    pub heavy_first: bool,
    pub molecule_key: String,
    pub report_progress: bool,
    pub task_label: Option<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
            batches_per_worker: 1,
            partition: PartitionKind::Uniform,
            heavy_first: false,
            molecule_key: crate::aggregate::DEFAULT_MOLECULE_KEY.to_string(),
            report_progress: true,
            task_label: None,
        }
    }
}

fn default_num_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl DispatchConfig {
    /// Defaults overridden by `MOLECULE_DISPATCH_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::load(None::<&Path>)
    }

    /// Defaults, then `path` if given and present, then the environment
    pub fn load(path: Option<impl AsRef<Path>>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            let path = path.as_ref();
            debug!(path = %path.display(), "Loading dispatch configuration file");
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let config: Self = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(DispatchError::Configuration(
                "num_workers must be at least 1".into(),
            ));
        }
        if self.batches_per_worker == 0 {
            return Err(DispatchError::Configuration(
                "batches_per_worker must be at least 1".into(),
            ));
        }
        if self.molecule_key.trim().is_empty() {
            return Err(DispatchError::Configuration(
                "molecule_key must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn partition_strategy(&self) -> PartitionStrategy {
        match self.partition {
            PartitionKind::Uniform => PartitionStrategy::Uniform,
            PartitionKind::Weighted => PartitionStrategy::Weighted {
                heavy_first: self.heavy_first,
            },
        }
    }
}

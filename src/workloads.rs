//! # Reference Workloads
//!
//! Concrete molecule tasks used by the benchmarks and integration tests.
//! [`BarrierTouchTask`] treats every column of a returns matrix as one atom
//! and finds, per column, the first row where the compounded path touches
//! a symmetric barrier.

use crate::error::{DispatchError, Result};
use crate::frame::{ChunkOutput, Series};
use crate::job::{Invocation, MoleculeTask};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

/// Row-major matrix of simple returns: rows are time steps, columns are paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnsMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl ReturnsMatrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(DispatchError::Configuration(format!(
                "returns matrix of {rows}x{cols} needs {} values, got {}",
                rows.saturating_mul(cols),
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Builds a matrix by calling `f(row, col)` for every cell
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(f(i, j));
            }
        }
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }
}

/// First row at which `ln(prod(1 + r))` of each column in `columns` reaches
/// `width` or `-width`. Columns that never touch are left out.
pub fn barrier_touch(returns: &ReturnsMatrix, columns: Range<usize>, width: f64) -> Series<usize, usize> {
    let mut touches = Series::new();
    for col in columns {
        let mut log_growth = 0.0;
        for row in 0..returns.rows() {
            log_growth += returns.get(row, col).ln_1p();
            if log_growth >= width || log_growth <= -width {
                touches.push(col, row);
                break;
            }
        }
    }
    touches
}

/// [`barrier_touch`] as a molecule task over column indices.
///
/// Parameters: the molecule key and `width`.
#[derive(Debug, Clone)]
pub struct BarrierTouchTask {
    returns: Arc<ReturnsMatrix>,
    parameters: [&'static str; 2],
}

impl BarrierTouchTask {
    pub fn new(returns: Arc<ReturnsMatrix>, molecule_key: &'static str) -> Self {
        Self {
            returns,
            parameters: [molecule_key, "width"],
        }
    }

    /// All column indices of the matrix, the atoms this task runs over
    pub fn atoms(&self) -> Vec<usize> {
        (0..self.returns.cols()).collect()
    }
}

impl MoleculeTask<usize> for BarrierTouchTask {
    type Output = ChunkOutput<usize, usize>;

    fn name(&self) -> &str {
        "barrier_touch"
    }

    fn parameters(&self) -> &[&'static str] {
        &self.parameters
    }

    fn call(&self, invocation: &Invocation<'_, usize>) -> anyhow::Result<Self::Output> {
        let width: f64 = invocation.arg("width")?;
        let columns = invocation.molecule().atoms();
        let mut touches = Series::new();
        for &col in columns {
            anyhow::ensure!(
                col < self.returns.cols(),
                "column {col} out of range for {} columns",
                self.returns.cols()
            );
            touches.concat(barrier_touch(&self.returns, col..col + 1, width));
        }
        Ok(ChunkOutput::Series(touches))
    }
}

//! # Partition Planner
//!
//! Computes ordered boundary indices over `[0, num_atoms)` so that a batch of
//! atoms can be split into contiguous molecules, one per job.
//!
//! ## Strategies
//!
//! - **Uniform**: equal-count molecules, boundaries at `ceil(i * n / k)`.
//! - **Weighted**: molecules sized so every job carries the same share of a
//!   triangular workload, where atom `i` costs proportionally to `i` (or to
//!   `n - i` when `heavy_first` is set). Typical of pairwise O(n²) loops
//!   that only visit one half of a symmetric matrix.
//!
//! Both strategies clamp the molecule count to `min(num_workers, num_atoms)`
//! and always yield strictly increasing boundaries from `0` to `num_atoms`.

use crate::error::{DispatchError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Ordered, strictly increasing molecule boundaries `b0 = 0 < ... < bk = num_atoms`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionPlan {
    boundaries: Vec<usize>,
}

impl PartitionPlan {
    /// Raw boundary indices, `num_molecules() + 1` entries
    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }

    pub fn num_molecules(&self) -> usize {
        self.boundaries.len() - 1
    }

    pub fn num_atoms(&self) -> usize {
        self.boundaries[self.boundaries.len() - 1]
    }

    /// Half-open atom range of every molecule, in order
    pub fn segments(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.boundaries.windows(2).map(|w| w[0]..w[1])
    }

    /// Molecule sizes, in order
    pub fn gaps(&self) -> Vec<usize> {
        self.boundaries.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Rebuilds the plan with its molecule sizes reversed
    pub fn reversed(&self) -> Self {
        let mut boundaries = Vec::with_capacity(self.boundaries.len());
        boundaries.push(0);
        let mut acc = 0;
        for gap in self.gaps().into_iter().rev() {
            acc += gap;
            boundaries.push(acc);
        }
        Self { boundaries }
    }
}

impl From<PartitionPlan> for Vec<usize> {
    fn from(plan: PartitionPlan) -> Self {
        plan.boundaries
    }
}

/// How a batch of atoms is cut into molecules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PartitionStrategy {
    /// Equal-count molecules
    #[default]
    Uniform,
    /// Equal triangular workload per molecule
    Weighted { heavy_first: bool },
}

impl PartitionStrategy {
    pub fn plan(&self, num_atoms: usize, num_workers: usize) -> Result<PartitionPlan> {
        match *self {
            Self::Uniform => uniform_partition(num_atoms, num_workers),
            Self::Weighted { heavy_first } => weighted_partition(num_atoms, num_workers, heavy_first),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Weighted { .. } => "weighted",
        }
    }
}

fn molecule_count(num_atoms: usize, num_workers: usize) -> Result<usize> {
    if num_atoms == 0 {
        return Err(DispatchError::invalid_partition(
            num_atoms,
            num_workers,
            "at least one atom is required",
        ));
    }
    if num_workers == 0 {
        return Err(DispatchError::invalid_partition(
            num_atoms,
            num_workers,
            "at least one worker is required",
        ));
    }
    Ok(num_workers.min(num_atoms))
}

/// Evenly spaced boundaries, each rounded up to the next integer.
///
/// ```rust
/// use molecule_dispatch::partition::uniform_partition;
///
/// let plan = uniform_partition(10, 3).unwrap();
/// assert_eq!(plan.boundaries(), &[0, 4, 7, 10]);
/// ```
pub fn uniform_partition(num_atoms: usize, num_workers: usize) -> Result<PartitionPlan> {
    let k = molecule_count(num_atoms, num_workers)?;
    let (n, k128) = (num_atoms as u128, k as u128);

    // ceil(i * n / k) in integer arithmetic avoids linspace drift
    let boundaries = (0..=k128)
        .map(|i| ((i * n + k128 - 1) / k128) as usize)
        .collect();

    Ok(PartitionPlan { boundaries })
}

/// Boundaries that equalize the cumulative triangular area per molecule.
///
/// Each boundary is the positive root of `x² + x = p² + p + n(n+1)/k` for
/// the previous (unrounded) boundary `p`, rounded half-to-even. With
/// `heavy_first` the molecule sizes are reversed so the first molecules are
/// the smallest, for workloads where early atoms are the expensive ones.
pub fn weighted_partition(
    num_atoms: usize,
    num_workers: usize,
    heavy_first: bool,
) -> Result<PartitionPlan> {
    let k = molecule_count(num_atoms, num_workers)?;
    let n = num_atoms as f64;
    let area = n * (n + 1.0) / k as f64;

    let mut raw = Vec::with_capacity(k + 1);
    raw.push(0.0_f64);
    let mut previous = 0.0_f64;
    for _ in 0..k {
        let discriminant = 1.0 + 4.0 * (previous * previous + previous + area);
        previous = (-1.0 + discriminant.sqrt()) / 2.0;
        raw.push(previous);
    }

    let mut boundaries: Vec<usize> = raw
        .iter()
        .map(|x| x.round_ties_even().max(0.0) as usize)
        .collect();
    boundaries[0] = 0;
    boundaries[k] = num_atoms;
    enforce_strictly_increasing(&mut boundaries);

    let plan = PartitionPlan { boundaries };
    Ok(if heavy_first { plan.reversed() } else { plan })
}

/// Repairs rounding collisions so that `b[i-1] < b[i]` holds everywhere.
///
/// Requires `b[0] == 0`, `b[k] == n` and `k <= n`. The forward pass lifts
/// each boundary to at least `b[i-1] + 1`; the backward pass caps it at
/// `b[i+1] - 1`. Untouched boundaries keep their rounded value.
fn enforce_strictly_increasing(boundaries: &mut [usize]) {
    let k = boundaries.len() - 1;
    for i in 1..k {
        boundaries[i] = boundaries[i].max(boundaries[i - 1] + 1);
    }
    for i in (1..k).rev() {
        boundaries[i] = boundaries[i].min(boundaries[i + 1] - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid(plan: &PartitionPlan, num_atoms: usize, num_workers: usize) {
        let b = plan.boundaries();
        assert_eq!(b.first(), Some(&0));
        assert_eq!(b.last(), Some(&num_atoms));
        assert_eq!(b.len(), num_workers.min(num_atoms) + 1);
        assert!(b.windows(2).all(|w| w[0] < w[1]), "not strictly increasing: {b:?}");
    }

    #[test]
    fn test_uniform_example() {
        let plan = uniform_partition(10, 3).unwrap();
        assert_eq!(plan.boundaries(), &[0, 4, 7, 10]);
        assert_eq!(plan.gaps(), vec![4, 3, 3]);
    }

    #[test]
    fn test_uniform_exact_division() {
        let plan = uniform_partition(6, 2).unwrap();
        assert_eq!(plan.boundaries(), &[0, 3, 6]);
        assert_eq!(plan.segments().collect::<Vec<_>>(), vec![0..3, 3..6]);
    }

    #[test]
    fn test_uniform_clamps_workers() {
        let plan = uniform_partition(3, 8).unwrap();
        assert_eq!(plan.boundaries(), &[0, 1, 2, 3]);
        assert_valid(&plan, 3, 8);
    }

    #[test]
    fn test_weighted_light_first() {
        let plan = weighted_partition(10, 3, false).unwrap();
        assert_eq!(plan.boundaries(), &[0, 6, 8, 10]);

        let plan = weighted_partition(100, 4, false).unwrap();
        assert_eq!(plan.boundaries(), &[0, 50, 71, 87, 100]);
    }

    #[test]
    fn test_weighted_heavy_first() {
        let plan = weighted_partition(10, 3, true).unwrap();
        assert_eq!(plan.boundaries(), &[0, 2, 4, 10]);

        let plan = weighted_partition(100, 4, true).unwrap();
        assert_eq!(plan.boundaries(), &[0, 13, 29, 50, 100]);
    }

    #[test]
    fn test_weighted_repairs_rounding_collisions() {
        // naive rounding gives [0, 2, 2, 3]
        let plan = weighted_partition(3, 3, false).unwrap();
        assert_eq!(plan.boundaries(), &[0, 1, 2, 3]);

        let plan = weighted_partition(5, 4, false).unwrap();
        assert_valid(&plan, 5, 4);
    }

    #[test]
    fn test_heavy_first_mirrors_light_first() {
        for (n, k) in [(10, 3), (1000, 24), (7, 7), (2, 1)] {
            let light = weighted_partition(n, k, false).unwrap();
            let heavy = weighted_partition(n, k, true).unwrap();
            let mut reversed = heavy.gaps();
            reversed.reverse();
            assert_eq!(reversed, light.gaps(), "n={n} k={k}");
        }
    }

    #[test]
    fn test_single_worker_is_one_molecule() {
        assert_eq!(uniform_partition(5, 1).unwrap().boundaries(), &[0, 5]);
        assert_eq!(weighted_partition(5, 1, true).unwrap().boundaries(), &[0, 5]);
    }

    #[test]
    fn test_rejects_empty_inputs() {
        assert!(matches!(
            uniform_partition(0, 4),
            Err(DispatchError::InvalidPartition { num_atoms: 0, .. })
        ));
        assert!(matches!(
            weighted_partition(10, 0, false),
            Err(DispatchError::InvalidPartition { num_workers: 0, .. })
        ));
    }

    #[test]
    fn test_strategy_dispatch() {
        let weighted = PartitionStrategy::Weighted { heavy_first: false };
        assert_eq!(weighted.plan(10, 3).unwrap().boundaries(), &[0, 6, 8, 10]);
        assert_eq!(PartitionStrategy::default().plan(10, 3).unwrap().num_molecules(), 3);
        assert_eq!(weighted.name(), "weighted");
    }
}

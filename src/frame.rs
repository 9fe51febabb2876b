//! # Result Shapes
//!
//! Minimal labeled containers returned by molecule tasks: a labeled sequence
//! ([`Series`]) and a row-indexed table ([`Frame`]). Both know how to stack
//! with their own kind along the row axis and how to restore label order.

use crate::error::{DispatchError, Result};
use serde::{Deserialize, Serialize};

/// Labeled sequence of `(label, value)` pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series<K, V> {
    entries: Vec<(K, V)>,
}

impl<K, V> Default for Series<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K, V> Series<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: K, value: V) {
        self.entries.push((label, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(K, V)] {
        &self.entries
    }

    pub fn labels(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn into_entries(self) -> Vec<(K, V)> {
        self.entries
    }

    /// Appends every entry of `other` after this series' entries
    pub fn concat(&mut self, other: Series<K, V>) {
        self.entries.extend(other.entries);
    }
}

impl<K: Ord, V> Series<K, V> {
    /// Stable sort by label
    pub fn sort_index(mut self) -> Self {
        self.entries.sort_by(|a, b| a.0.cmp(&b.0));
        self
    }

    /// Smallest label, `None` when empty
    pub fn lowest_label(&self) -> Option<&K> {
        self.labels().min()
    }
}

impl<K: PartialEq, V> Series<K, V> {
    pub fn get(&self, label: &K) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == label).map(|(_, v)| v)
    }
}

impl<K, V> FromIterator<(K, V)> for Series<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Row-indexed table with named columns.
///
/// Cells are optional so that frames with different column sets can be
/// stacked: a column absent from one of the inputs reads as `None` there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame<K, V> {
    columns: Vec<String>,
    index: Vec<K>,
    rows: Vec<Vec<Option<V>>>,
}

impl<K, V> Default for Frame<K, V> {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            index: Vec::new(),
            rows: Vec::new(),
        }
    }
}

impl<K, V> Frame<K, V> {
    pub fn with_columns<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            index: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Appends a fully populated row; `values` must match the column count
    pub fn push_row(&mut self, label: K, values: Vec<V>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(DispatchError::RowWidth {
                expected: self.columns.len(),
                found: values.len(),
            });
        }
        self.index.push(label);
        self.rows.push(values.into_iter().map(Some).collect());
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn index(&self) -> &[K] {
        &self.index
    }

    pub fn num_rows(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn row(&self, position: usize) -> Option<(&K, &[Option<V>])> {
        Some((self.index.get(position)?, self.rows.get(position)?.as_slice()))
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Stacks `other` below this frame, aligning columns by name.
    ///
    /// Unknown columns are appended in first-seen order; existing rows get
    /// `None` for them.
    pub fn concat(&mut self, other: Frame<K, V>) {
        let mapping: Vec<usize> = other
            .columns
            .into_iter()
            .map(|name| match self.column_position(&name) {
                Some(pos) => pos,
                None => {
                    self.columns.push(name);
                    for row in &mut self.rows {
                        row.push(None);
                    }
                    self.columns.len() - 1
                }
            })
            .collect();

        let width = self.columns.len();
        for (label, cells) in other.index.into_iter().zip(other.rows) {
            let mut row: Vec<Option<V>> = std::iter::repeat_with(|| None).take(width).collect();
            for (cell, &target) in cells.into_iter().zip(&mapping) {
                row[target] = cell;
            }
            self.index.push(label);
            self.rows.push(row);
        }
    }
}

impl<K: Ord, V> Frame<K, V> {
    /// Stable sort of rows by index label
    pub fn sort_index(self) -> Self {
        let Frame {
            columns,
            index,
            rows,
        } = self;
        let mut paired: Vec<(K, Vec<Option<V>>)> = index.into_iter().zip(rows).collect();
        paired.sort_by(|a, b| a.0.cmp(&b.0));
        let (index, rows) = paired.into_iter().unzip();
        Self {
            columns,
            index,
            rows,
        }
    }

    /// Smallest index label, `None` when the frame has no rows
    pub fn lowest_label(&self) -> Option<&K> {
        self.index.iter().min()
    }
}

/// Shape category of one job's output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeCategory {
    Frame,
    Series,
    Opaque,
}

impl ShapeCategory {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Frame => "frame",
            Self::Series => "series",
            Self::Opaque => "opaque",
        }
    }
}

/// Output of one molecule task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkOutput<K, V> {
    Frame(Frame<K, V>),
    Series(Series<K, V>),
    Opaque(serde_json::Value),
}

impl<K, V> ChunkOutput<K, V> {
    pub fn category(&self) -> ShapeCategory {
        match self {
            Self::Frame(_) => ShapeCategory::Frame,
            Self::Series(_) => ShapeCategory::Series,
            Self::Opaque(_) => ShapeCategory::Opaque,
        }
    }
}

impl<K, V> From<Series<K, V>> for ChunkOutput<K, V> {
    fn from(series: Series<K, V>) -> Self {
        Self::Series(series)
    }
}

impl<K, V> From<Frame<K, V>> for ChunkOutput<K, V> {
    fn from(frame: Frame<K, V>) -> Self {
        Self::Frame(frame)
    }
}

/// Merged result of a whole batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Merged<K, V> {
    Frame(Frame<K, V>),
    Series(Series<K, V>),
    /// Per-job outputs handed back unmerged, in collection order
    Raw(Vec<ChunkOutput<K, V>>),
}

impl<K, V> Merged<K, V> {
    pub fn into_series(self) -> Option<Series<K, V>> {
        match self {
            Self::Series(series) => Some(series),
            _ => None,
        }
    }

    pub fn into_frame(self) -> Option<Frame<K, V>> {
        match self {
            Self::Frame(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn into_raw(self) -> Option<Vec<ChunkOutput<K, V>>> {
        match self {
            Self::Raw(outputs) => Some(outputs),
            _ => None,
        }
    }
}

//! # Job Descriptors
//!
//! A job pairs a molecule task with one molecule (a contiguous slice of the
//! batch's atoms) and the named arguments shared by every job of the batch.
//!
//! Tasks declare the exact set of named parameters they accept, molecule key
//! included. The expander in [`crate::execution`] checks a descriptor's keys
//! against that set before invoking the task, and typed argument access goes
//! through [`Invocation::arg`], so signature problems surface when a job is
//! invoked rather than being silently ignored.

use crate::error::{DispatchError, Result};
use crate::partition::PartitionPlan;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::ops::Range;

/// Named arguments copied into every job of a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KwArgs {
    entries: BTreeMap<String, serde_json::Value>,
}

impl KwArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Builder-style [`KwArgs::insert`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts any serializable value
    pub fn insert_serialized<V: Serialize>(&mut self, name: impl Into<String>, value: &V) -> Result<()> {
        let name = name.into();
        let value = serde_json::to_value(value).map_err(|e| DispatchError::ArgumentType {
            task: String::from("<unbound>"),
            name: name.clone(),
            expected: "JSON-serializable value",
            message: e.to_string(),
        })?;
        self.entries.insert(name, value);
        Ok(())
    }

    pub fn get_raw(&self, name: &str) -> Option<&serde_json::Value> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Contiguous slice of atoms together with its position in the full batch
#[derive(Debug)]
pub struct Molecule<'a, T> {
    range: Range<usize>,
    atoms: &'a [T],
}

impl<'a, T> Clone for Molecule<'a, T> {
    fn clone(&self) -> Self {
        Self {
            range: self.range.clone(),
            atoms: self.atoms,
        }
    }
}

impl<'a, T> Molecule<'a, T> {
    /// `atoms` must be `items[range]` of the batch the molecule belongs to
    pub fn new(range: Range<usize>, atoms: &'a [T]) -> Self {
        debug_assert_eq!(range.len(), atoms.len());
        Self { range, atoms }
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn start(&self) -> usize {
        self.range.start
    }

    pub fn atoms(&self) -> &'a [T] {
        self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Atoms paired with their index in the full batch
    pub fn indexed(&self) -> impl Iterator<Item = (usize, &'a T)> + 'a {
        let start = self.range.start;
        self.atoms.iter().enumerate().map(move |(i, atom)| (start + i, atom))
    }
}

/// Everything a task sees when one of its jobs runs
#[derive(Debug)]
pub struct Invocation<'a, T> {
    task: &'a str,
    job: usize,
    molecule_key: &'a str,
    molecule: Molecule<'a, T>,
    kwargs: &'a KwArgs,
}

impl<'a, T> Invocation<'a, T> {
    pub fn task(&self) -> &str {
        self.task
    }

    pub fn job(&self) -> usize {
        self.job
    }

    pub fn molecule_key(&self) -> &str {
        self.molecule_key
    }

    pub fn molecule(&self) -> &Molecule<'a, T> {
        &self.molecule
    }

    pub fn kwargs(&self) -> &KwArgs {
        self.kwargs
    }

    /// Typed access to a named argument
    pub fn arg<D: DeserializeOwned>(&self, name: &str) -> Result<D> {
        let value = self
            .kwargs
            .get_raw(name)
            .ok_or_else(|| DispatchError::SignatureMismatch {
                task: self.task.to_string(),
                missing: vec![name.to_string()],
                unexpected: Vec::new(),
            })?;

        D::deserialize(value).map_err(|e| DispatchError::ArgumentType {
            task: self.task.to_string(),
            name: name.to_string(),
            expected: std::any::type_name::<D>(),
            message: e.to_string(),
        })
    }
}

/// A unit-of-work function applied to one molecule at a time
pub trait MoleculeTask<T>: Send + Sync {
    type Output: Send;

    /// Used as the default progress label and in error reports
    fn name(&self) -> &str;

    /// Every named parameter the task accepts, molecule key included
    fn parameters(&self) -> &[&'static str];

    fn call(&self, invocation: &Invocation<'_, T>) -> anyhow::Result<Self::Output>;
}

/// Closure-backed [`MoleculeTask`]
pub struct FnTask<T, O, F> {
    name: String,
    parameters: Vec<&'static str>,
    func: F,
    _marker: PhantomData<fn(&T) -> O>,
}

impl<T, O, F> FnTask<T, O, F>
where
    F: Fn(&Invocation<'_, T>) -> anyhow::Result<O>,
{
    pub fn new(
        name: impl Into<String>,
        parameters: impl IntoIterator<Item = &'static str>,
        func: F,
    ) -> Self {
        Self {
            name: name.into(),
            parameters: parameters.into_iter().collect(),
            func,
            _marker: PhantomData,
        }
    }
}

impl<T, O, F> MoleculeTask<T> for FnTask<T, O, F>
where
    F: Fn(&Invocation<'_, T>) -> anyhow::Result<O> + Send + Sync,
    O: Send,
{
    type Output = O;

    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> &[&'static str] {
        &self.parameters
    }

    fn call(&self, invocation: &Invocation<'_, T>) -> anyhow::Result<O> {
        (self.func)(invocation)
    }
}

/// One job: a task reference, its molecule and the shared named arguments.
///
/// Built once per partition segment and consumed exactly once by
/// [`crate::execution::expand_call`].
pub struct JobDescriptor<'a, F: ?Sized, T> {
    task: &'a F,
    index: usize,
    molecule_key: &'a str,
    molecule: Molecule<'a, T>,
    kwargs: &'a KwArgs,
}

impl<'a, F, T> JobDescriptor<'a, F, T>
where
    F: MoleculeTask<T> + ?Sized,
{
    pub fn new(
        task: &'a F,
        index: usize,
        molecule_key: &'a str,
        molecule: Molecule<'a, T>,
        kwargs: &'a KwArgs,
    ) -> Self {
        Self {
            task,
            index,
            molecule_key,
            molecule,
            kwargs,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn range(&self) -> Range<usize> {
        self.molecule.range()
    }

    pub fn task_name(&self) -> &str {
        self.task.name()
    }

    pub fn task_parameters(&self) -> &[&'static str] {
        self.task.parameters()
    }

    pub fn molecule_key(&self) -> &str {
        self.molecule_key
    }

    pub fn kwargs(&self) -> &KwArgs {
        self.kwargs
    }

    /// Names bound by this descriptor: the molecule key plus every kwarg
    pub fn keys(&self) -> Vec<&str> {
        std::iter::once(self.molecule_key)
            .chain(self.kwargs.keys())
            .collect()
    }

    /// Splits the descriptor into its task and the invocation handed to it
    pub fn into_parts(self) -> (&'a F, Invocation<'a, T>) {
        let invocation = Invocation {
            task: self.task.name(),
            job: self.index,
            molecule_key: self.molecule_key,
            molecule: self.molecule,
            kwargs: self.kwargs,
        };
        (self.task, invocation)
    }
}

/// One descriptor per segment of `plan`, in segment order
pub fn build_jobs<'a, F, T>(
    task: &'a F,
    molecule_key: &'a str,
    items: &'a [T],
    plan: &PartitionPlan,
    kwargs: &'a KwArgs,
) -> Vec<JobDescriptor<'a, F, T>>
where
    F: MoleculeTask<T> + ?Sized,
{
    plan.segments()
        .enumerate()
        .map(|(index, range)| {
            let molecule = Molecule::new(range.clone(), &items[range]);
            JobDescriptor::new(task, index, molecule_key, molecule, kwargs)
        })
        .collect()
}

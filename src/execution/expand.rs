//! Callback expansion: invoke a job's task with its named arguments.

use crate::error::{DispatchError, Result};
use crate::job::{JobDescriptor, MoleculeTask};
use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};

/// Checks the descriptor's bound names against the task's parameters, then
/// runs the task and returns its output unchanged.
///
/// Errors: [`DispatchError::ShadowedMoleculeKey`] when a named argument
/// reuses the molecule key, [`DispatchError::SignatureMismatch`] when the
/// names differ,
/// [`DispatchError::ArgumentType`] when a typed argument lookup inside the
/// task fails, [`DispatchError::JobFailed`] for any other task error and
/// [`DispatchError::JobPanicked`] when the task panics.
pub fn expand_call<F, T>(job: JobDescriptor<'_, F, T>) -> Result<F::Output>
where
    F: MoleculeTask<T> + ?Sized,
{
    check_signature(&job)?;

    let index = job.index();
    let range = job.range();
    let (task, invocation) = job.into_parts();

    match panic::catch_unwind(AssertUnwindSafe(|| task.call(&invocation))) {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) => Err(match err.downcast::<DispatchError>() {
            Ok(
                signature @ (DispatchError::SignatureMismatch { .. }
                | DispatchError::ArgumentType { .. }),
            ) => signature,
            Ok(other) => DispatchError::JobFailed {
                task: task.name().to_string(),
                job: index,
                range,
                source: other.into(),
            },
            Err(source) => DispatchError::JobFailed {
                task: task.name().to_string(),
                job: index,
                range,
                source,
            },
        }),
        Err(payload) => Err(DispatchError::JobPanicked {
            task: task.name().to_string(),
            job: index,
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn check_signature<F, T>(job: &JobDescriptor<'_, F, T>) -> Result<()>
where
    F: MoleculeTask<T> + ?Sized,
{
    if job.kwargs().contains(job.molecule_key()) {
        return Err(DispatchError::ShadowedMoleculeKey {
            task: job.task_name().to_string(),
            name: job.molecule_key().to_string(),
        });
    }

    let bound: BTreeSet<&str> = job.keys().into_iter().collect();
    let accepted: BTreeSet<&str> = job.task_parameters().iter().copied().collect();

    if bound == accepted {
        return Ok(());
    }

    Err(DispatchError::SignatureMismatch {
        task: job.task_name().to_string(),
        missing: accepted.difference(&bound).map(|s| s.to_string()).collect(),
        unexpected: bound.difference(&accepted).map(|s| s.to_string()).collect(),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{FnTask, Invocation, KwArgs, Molecule};

    fn run<F>(task: &F, kwargs: &KwArgs) -> Result<F::Output>
    where
        F: MoleculeTask<i64>,
    {
        static ITEMS: [i64; 4] = [1, 2, 3, 4];
        let job = JobDescriptor::new(task, 0, "molecule", Molecule::new(0..4, &ITEMS), kwargs);
        expand_call(job)
    }

    #[test]
    fn test_invokes_with_named_arguments() {
        let task = FnTask::new("scaled_sum", ["molecule", "factor"], |inv: &Invocation<'_, i64>| {
            let factor: i64 = inv.arg("factor")?;
            Ok(inv.molecule().atoms().iter().sum::<i64>() * factor)
        });
        let kwargs = KwArgs::new().with("factor", 3);
        assert_eq!(run(&task, &kwargs).unwrap(), 30);
    }

    #[test]
    fn test_rejects_unexpected_and_missing_names() {
        let task = FnTask::new("scaled_sum", ["molecule", "factor"], |_: &Invocation<'_, i64>| Ok(0));
        let kwargs = KwArgs::new().with("offset", 1);

        match run(&task, &kwargs) {
            Err(DispatchError::SignatureMismatch {
                missing,
                unexpected,
                ..
            }) => {
                assert_eq!(missing, vec!["factor".to_string()]);
                assert_eq!(unexpected, vec!["offset".to_string()]);
            }
            other => panic!("expected signature mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_argument_named_like_molecule_key() {
        let task = FnTask::new("echo", ["molecule"], |inv: &Invocation<'_, i64>| {
            inv.arg::<String>("molecule")
                .map_err(anyhow::Error::from)
        });
        let kwargs = KwArgs::new().with("molecule", "oops");
        match run(&task, &kwargs) {
            Err(DispatchError::ShadowedMoleculeKey { task, name }) => {
                assert_eq!(task, "echo");
                assert_eq!(name, "molecule");
            }
            other => panic!("expected shadowed molecule key, got {other:?}"),
        }
    }

    #[test]
    fn test_argument_type_errors_surface_directly() {
        let task = FnTask::new("typed", ["molecule", "factor"], |inv: &Invocation<'_, i64>| {
            let factor: i64 = inv.arg("factor")?;
            Ok(factor)
        });
        let kwargs = KwArgs::new().with("factor", "three");
        assert!(matches!(
            run(&task, &kwargs),
            Err(DispatchError::ArgumentType { .. })
        ));
    }

    #[test]
    fn test_task_error_becomes_job_failure() {
        let task = FnTask::new("boom", ["molecule"], |_: &Invocation<'_, i64>| -> anyhow::Result<i64> {
            anyhow::bail!("division by zero")
        });
        let err = run(&task, &KwArgs::new()).unwrap_err();
        assert!(err.is_job_failure());
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn test_panic_becomes_job_failure() {
        let task = FnTask::new("panics", ["molecule"], |_: &Invocation<'_, i64>| -> anyhow::Result<i64> {
            panic!("kaboom")
        });
        match run(&task, &KwArgs::new()) {
            Err(DispatchError::JobPanicked { message, .. }) => assert_eq!(message, "kaboom"),
            other => panic!("expected panic failure, got {other:?}"),
        }
    }
}

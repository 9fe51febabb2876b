//! Sequential engine, for debugging and single-worker batches.

use super::expand::expand_call;
use crate::error::Result;
use crate::job::{JobDescriptor, MoleculeTask};
use tracing::{debug, error};

/// Runs every job in list order on the calling thread.
///
/// Results are in job order. The first failure stops the run and is returned.
pub fn run_sequential<F, T>(jobs: Vec<JobDescriptor<'_, F, T>>) -> Result<Vec<F::Output>>
where
    F: MoleculeTask<T> + ?Sized,
{
    let total = jobs.len();
    let mut outputs = Vec::with_capacity(total);

    for job in jobs {
        let index = job.index();
        let range = job.range();
        match expand_call(job) {
            Ok(output) => {
                debug!(job = index, ?range, total, "Job completed");
                outputs.push(output);
            }
            Err(e) => {
                error!(job = index, ?range, error = %e, "Job failed");
                return Err(e);
            }
        }
    }

    Ok(outputs)
}

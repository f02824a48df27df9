// Dependency propagation: submit a completed job's direct children

use crate::errors::SchedulerError;
use crate::models::JobKey;
use crate::registry::JobRegistry;
use crate::scheduler::Scheduler;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Bridge between a scheduler-reported "job completed" event and the job
/// tree registered for that job
///
/// Only tree roots are ever registered, so a lookup miss is the expected
/// case for every non-root job and results in zero submissions.
pub struct PropagationRuntime {
    registry: Arc<JobRegistry>,
}

impl PropagationRuntime {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self { registry }
    }

    /// Submit every direct child of the completed job to the scheduler
    ///
    /// All children are submitted regardless of individual failures; the
    /// first submission error is reported after the full fan-out attempt.
    /// Children are not re-registered. Returns the number of children
    /// accepted by the scheduler.
    #[instrument(skip(self, scheduler), fields(job_key = %key))]
    pub async fn job_completed(
        &self,
        key: &JobKey,
        scheduler: &dyn Scheduler,
    ) -> Result<usize, SchedulerError> {
        let Some(node) = self.registry.get(key) else {
            debug!("No tree registered for completed job, nothing to propagate");
            return Ok(0);
        };

        let submissions = join_all(
            node.children
                .iter()
                .map(|child| async move { (child.key(), scheduler.schedule(child.detail.clone()).await) }),
        )
        .await;

        let mut submitted = 0;
        let mut first_error = None;
        for (child_key, result) in submissions {
            match result {
                Ok(fire_time) => {
                    debug!(child_key = %child_key, fire_time = %fire_time, "Dependent job submitted");
                    submitted += 1;
                }
                Err(e) => {
                    warn!(child_key = %child_key, error = %e, "Failed to submit dependent job");
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        if submitted > 0 {
            info!(children = submitted, "Propagated dependents of completed job");
        }
        Ok(submitted)
    }
}

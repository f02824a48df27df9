// Handler registry and job dispatch
//
// The hosting layer registers ready-made handler instances here; a
// scheduler executes fired jobs through the dispatcher, which decodes the
// payload, runs the handler, and triggers dependent propagation when the
// handler completed successfully.

use crate::errors::DispatchError;
use crate::job::{DataJob, Job, JobContext};
use crate::models::JobDetail;
use crate::propagation::PropagationRuntime;
use crate::registry::JobRegistry;
use crate::scheduler::Scheduler;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, instrument, warn};

#[async_trait]
trait ErasedHandler: Send + Sync {
    async fn run(&self, detail: &JobDetail, ctx: JobContext) -> Result<(), DispatchError>;
}

struct PlainHandler<J: Job> {
    job: J,
}

#[async_trait]
impl<J: Job> ErasedHandler for PlainHandler<J> {
    async fn run(&self, detail: &JobDetail, ctx: JobContext) -> Result<(), DispatchError> {
        self.job
            .process(ctx)
            .await
            .map_err(|source| DispatchError::Handler {
                key: detail.spec.key.clone(),
                source,
            })
    }
}

struct DataHandler<J: DataJob> {
    job: J,
}

#[async_trait]
impl<J: DataJob> ErasedHandler for DataHandler<J> {
    async fn run(&self, detail: &JobDetail, ctx: JobContext) -> Result<(), DispatchError> {
        let payload = detail
            .spec
            .payload
            .as_ref()
            .ok_or_else(|| DispatchError::PayloadMissing {
                key: detail.spec.key.clone(),
            })?;
        let data: J::Data =
            serde_json::from_value(payload.clone()).map_err(|e| DispatchError::PayloadDecode {
                key: detail.spec.key.clone(),
                reason: e.to_string(),
            })?;
        self.job
            .process(data, ctx)
            .await
            .map_err(|source| DispatchError::Handler {
                key: detail.spec.key.clone(),
                source,
            })
    }
}

/// Mapping from a job type reference to its handler instance
///
/// Stands in for reflection-based discovery: the host constructs handler
/// instances (with whatever wiring they need) and registers them once at
/// startup.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<&'static str, Arc<dyn ErasedHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a payload-free handler under its job type
    pub fn register<J: Job>(&self, job: J) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.insert(J::job_type(), Arc::new(PlainHandler { job }));
    }

    /// Register a payload-carrying handler under its job type
    pub fn register_data<J: DataJob>(&self, job: J) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.insert(J::job_type(), Arc::new(DataHandler { job }));
    }

    pub fn contains(&self, job_type: &str) -> bool {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.contains_key(job_type)
    }

    fn resolve(&self, job_type: &str) -> Option<Arc<dyn ErasedHandler>> {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.get(job_type).cloned()
    }
}

/// Dispatcher runs one firing of a job end to end
pub struct Dispatcher {
    handlers: Arc<HandlerRegistry>,
    propagation: PropagationRuntime,
}

impl Dispatcher {
    pub fn new(handlers: Arc<HandlerRegistry>, registry: Arc<JobRegistry>) -> Self {
        Self {
            handlers,
            propagation: PropagationRuntime::new(registry),
        }
    }

    /// Run the handler for a fired job and, on success, submit its
    /// dependents through `scheduler`
    ///
    /// A handler error is returned to the scheduler's failure path and
    /// suppresses propagation: a failed parent never schedules its
    /// children. Returns the number of dependents submitted.
    #[instrument(skip(self, detail, scheduler), fields(
        job_key = %detail.spec.key,
        job_type = %detail.spec.job_type
    ))]
    pub async fn execute(
        &self,
        detail: &JobDetail,
        fire_time: DateTime<Utc>,
        scheduler: &dyn Scheduler,
    ) -> Result<usize, DispatchError> {
        let handler = self
            .handlers
            .resolve(&detail.spec.job_type)
            .ok_or_else(|| DispatchError::HandlerNotFound(detail.spec.job_type.clone()))?;

        let ctx = JobContext {
            key: detail.spec.key.clone(),
            fire_time,
        };

        if let Err(e) = handler.run(detail, ctx).await {
            warn!(error = %e, "Job handler failed, skipping dependent propagation");
            return Err(e);
        }
        debug!("Job handler completed");

        self.propagation
            .job_completed(&detail.spec.key, scheduler)
            .await
            .map_err(|source| DispatchError::Propagation {
                key: detail.spec.key.clone(),
                source,
            })
    }
}

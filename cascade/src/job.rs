// Job handler traits and the execution context handed to them

use crate::models::JobKey;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Context passed to a handler for one firing of its job
#[derive(Debug, Clone)]
pub struct JobContext {
    pub key: JobKey,
    pub fire_time: DateTime<Utc>,
}

/// A job handler that takes no payload
///
/// Handler instances are constructed and wired by the hosting layer and
/// handed to the [`HandlerRegistry`](crate::dispatch::HandlerRegistry)
/// ready-made. An error returned from `process` is surfaced through the
/// scheduler's own failure path and suppresses dependent propagation for
/// that firing.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Stable reference to this handler type, used as the `job_type` of
    /// every job built for it
    fn job_type() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }

    async fn process(&self, ctx: JobContext) -> anyhow::Result<()>;
}

/// A job handler that declares a typed data payload
///
/// Jobs built for a `DataJob` require a payload before they can fire; the
/// payload is serialized at build time and decoded back into `Data` right
/// before `process` runs.
#[async_trait]
pub trait DataJob: Send + Sync + 'static {
    type Data: Serialize + DeserializeOwned + Send + Sync + 'static;

    fn job_type() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }

    async fn process(&self, data: Self::Data, ctx: JobContext) -> anyhow::Result<()>;
}

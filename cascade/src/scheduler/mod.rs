// Scheduler contract consumed by builders and the propagation runtime

pub mod local;

use crate::errors::SchedulerError;
use crate::models::JobDetail;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use local::{LocalScheduler, LocalSchedulerConfig};

/// Scheduler accepts a job plus its trigger and executes it at the right
/// time; all calendar, interval, and cron math is the scheduler's business
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Submit a job for execution; returns the first fire time
    async fn schedule(&self, detail: JobDetail) -> Result<DateTime<Utc>, SchedulerError>;
}

/// Factory indirection for obtaining a scheduler handle
#[async_trait]
pub trait SchedulerFactory: Send + Sync {
    async fn get_scheduler(&self) -> Result<Arc<dyn Scheduler>, SchedulerError>;
}

/// A factory that always hands out the same shared scheduler
pub struct SharedSchedulerFactory {
    scheduler: Arc<dyn Scheduler>,
}

impl SharedSchedulerFactory {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl SchedulerFactory for SharedSchedulerFactory {
    async fn get_scheduler(&self) -> Result<Arc<dyn Scheduler>, SchedulerError> {
        Ok(Arc::clone(&self.scheduler))
    }
}

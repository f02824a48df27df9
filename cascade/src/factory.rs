// Factory for builders, wired with the shared registry and scheduler

use crate::builder::{DataJobBuilder, DataTreeBuilder, JobBuilder, TreeBuilder};
use crate::errors::SchedulerError;
use crate::job::{DataJob, Job};
use crate::registry::JobRegistry;
use crate::scheduler::SchedulerFactory;
use std::sync::Arc;

/// Entry point handed to callers by the hosting layer
///
/// Owns the shared [`JobRegistry`] and a [`SchedulerFactory`]; every
/// builder it creates resolves a scheduler handle through the factory at
/// creation time, mirroring how the hosting layer obtains handles itself.
pub struct JobFactory {
    registry: Arc<JobRegistry>,
    scheduler_factory: Arc<dyn SchedulerFactory>,
}

impl JobFactory {
    pub fn new(registry: Arc<JobRegistry>, scheduler_factory: Arc<dyn SchedulerFactory>) -> Self {
        Self {
            registry,
            scheduler_factory,
        }
    }

    /// The shared registry, for wiring into completion callbacks
    pub fn registry(&self) -> Arc<JobRegistry> {
        Arc::clone(&self.registry)
    }

    /// Builder for an independent payload-free job
    pub async fn job<J: Job>(&self) -> Result<JobBuilder<J>, SchedulerError> {
        let scheduler = self.scheduler_factory.get_scheduler().await?;
        Ok(JobBuilder::new(scheduler))
    }

    /// Builder for an independent payload-carrying job
    pub async fn data_job<J: DataJob>(&self) -> Result<DataJobBuilder<J>, SchedulerError> {
        let scheduler = self.scheduler_factory.get_scheduler().await?;
        Ok(DataJobBuilder::new(scheduler))
    }

    /// Builder for a job tree rooted at a payload-free job
    pub async fn tree<J: Job>(&self) -> Result<TreeBuilder<J>, SchedulerError> {
        let scheduler = self.scheduler_factory.get_scheduler().await?;
        Ok(TreeBuilder::new(Arc::clone(&self.registry), scheduler))
    }

    /// Builder for a job tree rooted at a payload-carrying job
    pub async fn data_tree<J: DataJob>(&self) -> Result<DataTreeBuilder<J>, SchedulerError> {
        let scheduler = self.scheduler_factory.get_scheduler().await?;
        Ok(DataTreeBuilder::new(Arc::clone(&self.registry), scheduler))
    }
}

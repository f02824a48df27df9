// cascade: dependent job trees over an async scheduler
//
// Build a tree of jobs with a fluent builder, fire the root, and every
// job's declared dependents are submitted to the scheduler when the job's
// handler completes successfully.

pub mod builder;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod factory;
pub mod job;
pub mod models;
pub mod propagation;
pub mod registry;
pub mod schedule;
pub mod scheduler;
pub mod telemetry;
pub mod tree;

pub use builder::{DataJobBuilder, DataTreeBuilder, JobBuilder, TreeBuilder};
pub use dispatch::{Dispatcher, HandlerRegistry};
pub use errors::{ConfigError, DispatchError, FireError, ScheduleError, SchedulerError};
pub use factory::JobFactory;
pub use job::{DataJob, Job, JobContext};
pub use models::{JobDetail, JobKey, JobSpec, RepeatCount, ScheduleSpec, Trigger};
pub use propagation::PropagationRuntime;
pub use registry::JobRegistry;
pub use scheduler::{
    LocalScheduler, LocalSchedulerConfig, Scheduler, SchedulerFactory, SharedSchedulerFactory,
};
pub use tree::JobTreeNode;

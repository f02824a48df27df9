// Fluent builders for independent jobs and dependent job trees
//
// Four builder kinds share one untyped core: plain and data-carrying
// variants, with and without dependent-tree support. Data variants track a
// payload-required flag that is checked when the builder finalizes, so a
// forgotten payload is a construction error and never reaches a scheduler.
// Builders are single-use: `fire` consumes the builder, and a builder
// attached as a dependent is consumed by the attachment.

use crate::errors::{ConfigError, FireError, ScheduleError};
use crate::job::{DataJob, Job};
use crate::models::{JobDetail, JobKey, JobSpec, RepeatCount, ScheduleSpec, Trigger};
use crate::registry::JobRegistry;
use crate::schedule::{self, default_timezone};
use crate::scheduler::Scheduler;
use crate::tree::JobTreeNode;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Accumulated configuration shared by every builder kind
#[derive(Debug)]
struct BuilderCore {
    job_type: &'static str,
    payload_required: bool,
    name: Option<String>,
    group: Option<String>,
    description: Option<String>,
    allow_concurrent: bool,
    request_recovery: bool,
    durable: bool,
    priority: i32,
    end_time: Option<DateTime<Utc>>,
    trigger: Option<Trigger>,
    payload: Option<serde_json::Value>,
    children: HashSet<JobTreeNode>,
    // First configuration mistake, surfaced when the builder finalizes
    deferred_error: Option<ConfigError>,
}

impl BuilderCore {
    fn new(job_type: &'static str, payload_required: bool) -> Self {
        Self {
            job_type,
            payload_required,
            name: None,
            group: None,
            description: None,
            allow_concurrent: true,
            request_recovery: false,
            durable: false,
            priority: 0,
            end_time: None,
            trigger: None,
            payload: None,
            children: HashSet::new(),
            deferred_error: None,
        }
    }

    fn record_error(&mut self, error: ConfigError) {
        if self.deferred_error.is_none() {
            self.deferred_error = Some(error);
        }
    }

    fn set_cron(&mut self, expression: &str, timezone: Tz) {
        match schedule::parse_cron_expression(expression) {
            Ok(_) => {
                self.trigger = Some(Trigger::Cron {
                    expression: expression.to_string(),
                    timezone,
                });
            }
            Err(ScheduleError::InvalidCronExpression { expression, reason }) => {
                self.record_error(ConfigError::InvalidCronExpression { expression, reason });
            }
            Err(other) => {
                self.record_error(ConfigError::InvalidCronExpression {
                    expression: expression.to_string(),
                    reason: other.to_string(),
                });
            }
        }
    }

    fn set_payload<T: serde::Serialize>(&mut self, value: &T) {
        match serde_json::to_value(value) {
            Ok(payload) => self.payload = Some(payload),
            Err(e) => self.record_error(ConfigError::PayloadSerialization {
                job_type: self.job_type.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Assign the identity, default the schedule, and validate
    fn finalize(mut self) -> Result<JobTreeNode, ConfigError> {
        if let Some(error) = self.deferred_error.take() {
            return Err(error);
        }
        if self.payload_required && self.payload.is_none() {
            return Err(ConfigError::PayloadMissing {
                job_type: self.job_type.to_string(),
            });
        }

        let mut key = JobKey::generated();
        if let Some(name) = self.name {
            key.name = name;
        }
        if let Some(group) = self.group {
            key.group = group;
        }

        let detail = JobDetail {
            spec: JobSpec {
                key,
                job_type: self.job_type.to_string(),
                payload: self.payload,
                description: self.description,
                allow_concurrent: self.allow_concurrent,
                request_recovery: self.request_recovery,
                durable: self.durable,
            },
            schedule: ScheduleSpec {
                trigger: self.trigger.unwrap_or(Trigger::Immediate),
                end_time: self.end_time,
                priority: self.priority,
            },
        };

        Ok(JobTreeNode {
            detail,
            children: self.children,
        })
    }
}

macro_rules! configure_methods {
    () => {
        /// Override the generated job name; identity is fixed at fire time
        pub fn name(mut self, name: impl Into<String>) -> Self {
            self.core.name = Some(name.into());
            self
        }

        /// Override the default job group
        pub fn group(mut self, group: impl Into<String>) -> Self {
            self.core.group = Some(group.into());
            self
        }

        pub fn description(mut self, description: impl Into<String>) -> Self {
            self.core.description = Some(description.into());
            self
        }

        /// Allow or forbid concurrent firings of this job definition
        pub fn concurrent(mut self, allow: bool) -> Self {
            self.core.allow_concurrent = allow;
            self
        }

        pub fn request_recovery(mut self, request: bool) -> Self {
            self.core.request_recovery = request;
            self
        }

        pub fn durable(mut self, store: bool) -> Self {
            self.core.durable = store;
            self
        }

        /// Higher priority runs first when firings tie on time
        pub fn priority(mut self, priority: i32) -> Self {
            self.core.priority = priority;
            self
        }

        /// No firing is scheduled past this instant
        pub fn end_at(mut self, end_time: DateTime<Utc>) -> Self {
            self.core.end_time = Some(end_time);
            self
        }

        /// Set the trigger explicitly, overriding the `Immediate` default
        pub fn schedule(mut self, trigger: Trigger) -> Self {
            self.core.trigger = Some(trigger);
            self
        }

        /// Fire once at an absolute instant
        pub fn start_at(mut self, fire_at: DateTime<Utc>) -> Self {
            self.core.trigger = Some(Trigger::At { fire_at });
            self
        }

        /// Fire repeatedly at a fixed period
        ///
        /// Periods have whole-second resolution; sub-second durations are
        /// reported as a configuration error when the builder finalizes.
        pub fn interval(mut self, period: Duration, repeat: RepeatCount) -> Self {
            if period.as_secs() == 0 {
                self.core.record_error(ConfigError::IntervalTooShort {
                    period_ms: period.as_millis(),
                });
                return self;
            }
            self.core.trigger = Some(Trigger::Interval {
                period_seconds: period.as_secs(),
                repeat,
            });
            self
        }

        /// Fire on a cron expression in UTC; invalid syntax is reported as
        /// a configuration error when the builder finalizes
        pub fn cron(mut self, expression: &str) -> Self {
            self.core.set_cron(expression, default_timezone());
            self
        }

        /// Fire on a cron expression evaluated in the given timezone
        pub fn cron_in_timezone(mut self, expression: &str, timezone: Tz) -> Self {
            self.core.set_cron(expression, timezone);
            self
        }
    };
}

macro_rules! dependent_methods {
    () => {
        /// Configure and attach a fresh dependent job of type `C`
        ///
        /// The child builder is finalized when `configure` returns: its
        /// identity is assigned and its schedule defaults to `Immediate`.
        pub fn add_dependent<C: Job>(
            mut self,
            configure: impl FnOnce(TreeBuilder<C>) -> TreeBuilder<C>,
        ) -> Result<Self, ConfigError> {
            let child = TreeBuilder::<C>::new(
                Arc::clone(&self.registry),
                Arc::clone(&self.scheduler),
            );
            let node = configure(child).core.finalize()?;
            self.core.children.insert(node);
            Ok(self)
        }

        /// Configure and attach a fresh payload-carrying dependent
        ///
        /// Fails with a configuration error if `configure` never set the
        /// child's data.
        pub fn add_dependent_data<C: DataJob>(
            mut self,
            configure: impl FnOnce(DataTreeBuilder<C>) -> DataTreeBuilder<C>,
        ) -> Result<Self, ConfigError> {
            let child = DataTreeBuilder::<C>::new(
                Arc::clone(&self.registry),
                Arc::clone(&self.scheduler),
            );
            let node = configure(child).core.finalize()?;
            self.core.children.insert(node);
            Ok(self)
        }

        /// Attach an independently configured dependent builder
        ///
        /// The child is finalized here; its already-built subtree is
        /// reused as-is, never a live reference back to its builder.
        pub fn add_dependent_tree<C: Job>(
            mut self,
            child: TreeBuilder<C>,
        ) -> Result<Self, ConfigError> {
            let node = child.core.finalize()?;
            self.core.children.insert(node);
            Ok(self)
        }

        /// Attach an independently configured payload-carrying dependent;
        /// the same payload-required check applies
        pub fn add_dependent_data_tree<C: DataJob>(
            mut self,
            child: DataTreeBuilder<C>,
        ) -> Result<Self, ConfigError> {
            let node = child.core.finalize()?;
            self.core.children.insert(node);
            Ok(self)
        }
    };
}

/// Builder for an independent job without a payload
pub struct JobBuilder<J: Job> {
    core: BuilderCore,
    scheduler: Arc<dyn Scheduler>,
    _job: PhantomData<fn() -> J>,
}

impl<J: Job> JobBuilder<J> {
    pub(crate) fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            core: BuilderCore::new(J::job_type(), false),
            scheduler,
            _job: PhantomData,
        }
    }

    configure_methods!();

    /// Finalize and submit the job; returns the first fire time
    pub async fn fire(self) -> Result<DateTime<Utc>, FireError> {
        let node = self.core.finalize()?;
        submit(&*self.scheduler, node.detail).await
    }
}

/// Builder for an independent job with a typed payload
pub struct DataJobBuilder<J: DataJob> {
    core: BuilderCore,
    scheduler: Arc<dyn Scheduler>,
    _job: PhantomData<fn() -> J>,
}

impl<J: DataJob> DataJobBuilder<J> {
    pub(crate) fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            core: BuilderCore::new(J::job_type(), true),
            scheduler,
            _job: PhantomData,
        }
    }

    configure_methods!();

    /// Attach the typed payload; calling twice overwrites
    pub fn data(mut self, value: &J::Data) -> Self {
        self.core.set_payload(value);
        self
    }

    /// Finalize and submit the job; fails fast if no payload was attached
    pub async fn fire(self) -> Result<DateTime<Utc>, FireError> {
        let node = self.core.finalize()?;
        submit(&*self.scheduler, node.detail).await
    }
}

/// Builder for a job tree rooted at a payload-free job
pub struct TreeBuilder<J: Job> {
    core: BuilderCore,
    registry: Arc<JobRegistry>,
    scheduler: Arc<dyn Scheduler>,
    _job: PhantomData<fn() -> J>,
}

impl<J: Job> TreeBuilder<J> {
    pub(crate) fn new(registry: Arc<JobRegistry>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            core: BuilderCore::new(J::job_type(), false),
            registry,
            scheduler,
            _job: PhantomData,
        }
    }

    configure_methods!();
    dependent_methods!();

    /// Finalize the whole tree, submit the root to the scheduler, and
    /// register the tree for dependent propagation
    #[instrument(skip(self), fields(job_type = self.core.job_type))]
    pub async fn fire(self) -> Result<DateTime<Utc>, FireError> {
        let node = self.core.finalize()?;
        fire_tree(&self.registry, &*self.scheduler, node).await
    }
}

/// Builder for a job tree rooted at a payload-carrying job
pub struct DataTreeBuilder<J: DataJob> {
    core: BuilderCore,
    registry: Arc<JobRegistry>,
    scheduler: Arc<dyn Scheduler>,
    _job: PhantomData<fn() -> J>,
}

impl<J: DataJob> DataTreeBuilder<J> {
    pub(crate) fn new(registry: Arc<JobRegistry>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            core: BuilderCore::new(J::job_type(), true),
            registry,
            scheduler,
            _job: PhantomData,
        }
    }

    configure_methods!();
    dependent_methods!();

    /// Attach the typed payload; calling twice overwrites
    pub fn data(mut self, value: &J::Data) -> Self {
        self.core.set_payload(value);
        self
    }

    /// Finalize the whole tree, submit the root, and register the tree
    #[instrument(skip(self), fields(job_type = self.core.job_type))]
    pub async fn fire(self) -> Result<DateTime<Utc>, FireError> {
        let node = self.core.finalize()?;
        fire_tree(&self.registry, &*self.scheduler, node).await
    }
}

async fn submit(scheduler: &dyn Scheduler, detail: JobDetail) -> Result<DateTime<Utc>, FireError> {
    let key = detail.spec.key.clone();
    let fire_time = scheduler
        .schedule(detail)
        .await
        .map_err(FireError::Submission)?;
    debug!(job_key = %key, fire_time = %fire_time, "Job submitted");
    Ok(fire_time)
}

/// Submit a finalized root and register its tree under the root identity
///
/// Registration happens after the scheduler accepted the root, so a
/// rejected submission leaves no orphan registry entry. Trees without
/// dependents have nothing to propagate and are not registered.
async fn fire_tree(
    registry: &JobRegistry,
    scheduler: &dyn Scheduler,
    node: JobTreeNode,
) -> Result<DateTime<Utc>, FireError> {
    let detail = node.detail.clone();
    let key = detail.spec.key.clone();

    let fire_time = scheduler
        .schedule(detail)
        .await
        .map_err(FireError::Submission)?;

    if !node.children.is_empty() {
        debug!(
            job_key = %key,
            nodes = node.total_nodes(),
            "Job tree registered for propagation"
        );
        registry.insert(key.clone(), Arc::new(node));
    }

    debug!(job_key = %key, fire_time = %fire_time, "Root job submitted");
    Ok(fire_time)
}

// Property-based tests for tree construction and firing

use async_trait::async_trait;
use cascade::{
    DataJob, Job, JobContext, JobDetail, JobFactory, JobRegistry, Scheduler, SchedulerError,
    SharedSchedulerFactory,
};
use chrono::{DateTime, Utc};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

// Mock implementations for testing

/// Scheduler that records every submission it accepts
struct RecordingScheduler {
    submitted: Mutex<Vec<JobDetail>>,
}

impl RecordingScheduler {
    fn new() -> Self {
        Self {
            submitted: Mutex::new(Vec::new()),
        }
    }

    fn submissions(&self) -> Vec<JobDetail> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn schedule(&self, detail: JobDetail) -> Result<DateTime<Utc>, SchedulerError> {
        self.submitted.lock().unwrap().push(detail);
        Ok(Utc::now())
    }
}

struct RootJob;

#[async_trait]
impl Job for RootJob {
    async fn process(&self, _ctx: JobContext) -> anyhow::Result<()> {
        Ok(())
    }
}

struct ChildJob;

#[async_trait]
impl Job for ChildJob {
    async fn process(&self, _ctx: JobContext) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct EchoData {
    message: String,
    count: u32,
}

struct EchoJob;

#[async_trait]
impl DataJob for EchoJob {
    type Data = EchoData;

    async fn process(&self, _data: EchoData, _ctx: JobContext) -> anyhow::Result<()> {
        Ok(())
    }
}

fn harness() -> (JobFactory, Arc<RecordingScheduler>, Arc<JobRegistry>) {
    let scheduler = Arc::new(RecordingScheduler::new());
    let registry = Arc::new(JobRegistry::new());
    let factory = JobFactory::new(
        Arc::clone(&registry),
        Arc::new(SharedSchedulerFactory::new(scheduler.clone())),
    );
    (factory, scheduler, registry)
}

/// *For any* set of distinct child names attached under one root, firing
/// the root submits exactly one job to the scheduler, and the registry
/// holds one tree (when dependents exist) with exactly that child set.
#[test]
fn property_firing_submits_one_root_and_registers_declared_children() {
    let rt = tokio::runtime::Runtime::new().unwrap();

    proptest!(|(names in prop::collection::hash_set("[a-z]{1,8}", 0..8))| {
        rt.block_on(async {
            let (factory, scheduler, registry) = harness();

            let mut builder = factory.tree::<RootJob>().await.unwrap().name("root");
            for name in &names {
                let name = name.clone();
                builder = builder
                    .add_dependent::<ChildJob>(move |c| c.name(name))
                    .unwrap();
            }
            builder.fire().await.unwrap();

            let submissions = scheduler.submissions();
            prop_assert_eq!(submissions.len(), 1);
            prop_assert_eq!(&submissions[0].spec.key.name, "root");

            if names.is_empty() {
                prop_assert!(registry.is_empty());
            } else {
                prop_assert_eq!(registry.len(), 1);
                let node = registry
                    .get(&cascade::JobKey::new("root", "default"))
                    .unwrap();
                prop_assert_eq!(node.children.len(), names.len());
                for child in &node.children {
                    prop_assert!(names.contains(&child.key().name));
                }
            }
            Ok(())
        })?;
    });
}

/// *For any* payload value, the fired job carries a payload that decodes
/// back to the original value.
#[test]
fn property_payload_round_trips_through_a_fired_job() {
    let rt = tokio::runtime::Runtime::new().unwrap();

    proptest!(|(message in "[ -~]{0,32}", count in any::<u32>())| {
        rt.block_on(async {
            let (factory, scheduler, _registry) = harness();
            let data = EchoData { message, count };

            factory
                .data_job::<EchoJob>()
                .await
                .unwrap()
                .data(&data)
                .fire()
                .await
                .unwrap();

            let submissions = scheduler.submissions();
            prop_assert_eq!(submissions.len(), 1);
            let payload = submissions[0].spec.payload.clone().unwrap();
            let decoded: EchoData = serde_json::from_value(payload).unwrap();
            prop_assert_eq!(decoded, data);
            Ok(())
        })?;
    });
}

/// *For any* schedule options, a payload-requiring job fired without data
/// fails with a configuration error and the scheduler never sees it.
#[test]
fn property_missing_payload_never_reaches_the_scheduler() {
    let rt = tokio::runtime::Runtime::new().unwrap();

    proptest!(|(priority in -100i32..100i32, period in 1u64..3600u64)| {
        rt.block_on(async {
            let (factory, scheduler, registry) = harness();

            let result = factory
                .data_tree::<EchoJob>()
                .await
                .unwrap()
                .priority(priority)
                .interval(
                    std::time::Duration::from_secs(period),
                    cascade::RepeatCount::Forever,
                )
                .fire()
                .await;

            prop_assert!(
                matches!(
                    result,
                    Err(cascade::FireError::Config(
                        cascade::ConfigError::PayloadMissing { .. }
                    ))
                ),
                "expected PayloadMissing config error, got {:?}",
                result
            );
            prop_assert!(scheduler.submissions().is_empty());
            prop_assert!(registry.is_empty());
            Ok(())
        })?;
    });
}

/// *For any* priority and end time, the fired detail preserves the
/// configured schedule options.
#[test]
fn property_schedule_options_flow_into_the_submitted_detail() {
    let rt = tokio::runtime::Runtime::new().unwrap();

    proptest!(|(priority in -100i32..100i32, end_offset_secs in 1i64..86_400i64)| {
        rt.block_on(async {
            let (factory, scheduler, _registry) = harness();
            let end = Utc::now() + chrono::Duration::seconds(end_offset_secs);

            factory
                .tree::<RootJob>()
                .await
                .unwrap()
                .priority(priority)
                .end_at(end)
                .fire()
                .await
                .unwrap();

            let submissions = scheduler.submissions();
            prop_assert_eq!(submissions.len(), 1);
            prop_assert_eq!(submissions[0].schedule.priority, priority);
            prop_assert_eq!(submissions[0].schedule.end_time, Some(end));
            Ok(())
        })?;
    });
}

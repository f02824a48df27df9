// Core data model: job identity, specs, triggers, and the scheduled unit

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Group assigned to jobs whose caller never picked one
pub const DEFAULT_GROUP: &str = "default";

/// Unique identity of a job: a name within a group
///
/// Assigned once when a builder finalizes and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub name: String,
    pub group: String,
}

impl JobKey {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }

    /// A key with a freshly generated unique name in the default group
    pub fn generated() -> Self {
        Self {
            name: Uuid::new_v4().to_string(),
            group: DEFAULT_GROUP.to_string(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// How many times an interval trigger repeats after its first firing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RepeatCount {
    Forever,
    Times { count: u32 },
}

/// Trigger defines when a job fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Fire as soon as the job is accepted by the scheduler
    Immediate,
    /// Fire once at an absolute instant
    At { fire_at: DateTime<Utc> },
    /// Fire repeatedly at a fixed period
    Interval {
        period_seconds: u64,
        repeat: RepeatCount,
    },
    /// Fire on a cron expression, evaluated in the given timezone
    Cron { expression: String, timezone: Tz },
}

impl Trigger {
    /// Short label used in errors and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::Immediate => "immediate",
            Trigger::At { .. } => "at",
            Trigger::Interval { .. } => "interval",
            Trigger::Cron { .. } => "cron",
        }
    }
}

/// ScheduleSpec describes when a job should run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    pub trigger: Trigger,
    /// No firing is scheduled past this instant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Higher priority wins when two jobs are due at the same instant
    #[serde(default)]
    pub priority: i32,
}

impl Default for ScheduleSpec {
    fn default() -> Self {
        Self {
            trigger: Trigger::Immediate,
            end_time: None,
            priority: 0,
        }
    }
}

/// JobSpec describes what runs and with what payload and options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub key: JobKey,
    /// Handler type reference, resolved through the handler registry
    pub job_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether multiple firings of this definition may run at once
    pub allow_concurrent: bool,
    pub request_recovery: bool,
    pub durable: bool,
}

/// The unit submitted to a scheduler: a job plus its timing policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetail {
    pub spec: JobSpec,
    pub schedule: ScheduleSpec,
}

impl JobDetail {
    pub fn key(&self) -> &JobKey {
        &self.spec.key
    }
}

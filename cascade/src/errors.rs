// Error handling framework

use crate::models::JobKey;
use thiserror::Error;

/// Builder configuration errors, raised synchronously during tree
/// construction or at fire time, before any scheduler interaction
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No payload has been provided for job type '{job_type}'. Did you forget to call data()?")]
    PayloadMissing { job_type: String },

    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("Payload serialization failed for job type '{job_type}': {reason}")]
    PayloadSerialization { job_type: String, reason: String },

    #[error("Interval period of {period_ms} ms is below the one second resolution")]
    IntervalTooShort { period_ms: u128 },
}

/// Trigger calculation errors
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("No next fire time available for {trigger_kind} trigger")]
    NoNextFireTime { trigger_kind: String },
}

/// Errors reported by a scheduler when a job is submitted to it
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Scheduler rejected job '{key}': {reason}")]
    Rejected { key: JobKey, reason: String },

    #[error("Scheduler has been shut down")]
    ShutDown,

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Errors surfaced by `fire()`: either the builder configuration was
/// invalid or the scheduler refused the submission
#[derive(Error, Debug)]
pub enum FireError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Submission(#[from] SchedulerError),
}

/// Execution-side errors raised while dispatching a fired job to its handler
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("No handler registered for job type '{0}'")]
    HandlerNotFound(String),

    #[error("Job '{key}' requires a payload but none was attached")]
    PayloadMissing { key: JobKey },

    #[error("Failed to decode payload for job '{key}': {reason}")]
    PayloadDecode { key: JobKey, reason: String },

    #[error("Handler for job '{key}' failed: {source}")]
    Handler {
        key: JobKey,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to propagate dependents of job '{key}': {source}")]
    Propagation {
        key: JobKey,
        #[source]
        source: SchedulerError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::PayloadMissing {
            job_type: "jobs::Notify".to_string(),
        };
        assert!(err.to_string().contains("Did you forget to call data()?"));
    }

    #[test]
    fn test_invalid_cron_display() {
        let err = ConfigError::InvalidCronExpression {
            expression: "* * *".to_string(),
            reason: "too few fields".to_string(),
        };
        assert!(err.to_string().contains("Invalid cron expression"));
        assert!(err.to_string().contains("* * *"));
    }

    #[test]
    fn test_fire_error_wraps_config() {
        let err: FireError = ConfigError::PayloadMissing {
            job_type: "jobs::Notify".to_string(),
        }
        .into();
        assert!(matches!(err, FireError::Config(_)));
    }

    #[test]
    fn test_scheduler_error_display() {
        let err = SchedulerError::Rejected {
            key: JobKey::new("report", "nightly"),
            reason: "queue full".to_string(),
        };
        assert!(err.to_string().contains("nightly.report"));
        assert!(err.to_string().contains("queue full"));
    }
}

// Trigger parsing and fire-time calculation
//
// This module implements cron-expression validation and next fire time
// calculation for all trigger types: Immediate, At, Interval, and Cron.
// The bundled local scheduler drives its timing off these functions; an
// external scheduler is free to own this math itself.

use crate::errors::ScheduleError;
use crate::models::{RepeatCount, ScheduleSpec, Trigger};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::str::FromStr;

/// FireTimes defines the interface for calculating when a schedule fires
pub trait FireTimes {
    /// Calculate the next fire time given the previous fire time and the
    /// number of completed firings. `None` means the schedule is exhausted.
    fn next_fire_time(
        &self,
        last_fire: Option<DateTime<Utc>>,
        completed_firings: u32,
    ) -> Result<Option<DateTime<Utc>>, ScheduleError>;

    /// Check whether the schedule has no firings left
    fn is_complete(&self, last_fire: Option<DateTime<Utc>>, completed_firings: u32) -> bool;
}

impl FireTimes for ScheduleSpec {
    fn next_fire_time(
        &self,
        last_fire: Option<DateTime<Utc>>,
        completed_firings: u32,
    ) -> Result<Option<DateTime<Utc>>, ScheduleError> {
        let next = match &self.trigger {
            Trigger::Immediate => one_shot_next(Utc::now(), last_fire),

            Trigger::At { fire_at } => one_shot_next(*fire_at, last_fire),

            Trigger::Interval {
                period_seconds,
                repeat,
            } => interval_next(*period_seconds, *repeat, last_fire, completed_firings),

            Trigger::Cron {
                expression,
                timezone,
            } => cron_next(expression, *timezone, last_fire)?,
        };

        // A firing past the end time never happens
        match (next, self.end_time) {
            (Some(fire), Some(end)) if fire > end => Ok(None),
            _ => Ok(next),
        }
    }

    fn is_complete(&self, last_fire: Option<DateTime<Utc>>, completed_firings: u32) -> bool {
        match &self.trigger {
            // One-shot triggers are complete after their single firing
            Trigger::Immediate | Trigger::At { .. } => last_fire.is_some(),

            Trigger::Interval { repeat, .. } => match repeat {
                RepeatCount::Forever => false,
                // Times { count } allows the first firing plus `count` repeats
                RepeatCount::Times { count } => completed_firings > *count,
            },

            Trigger::Cron { .. } => {
                if let (Some(end), Some(last)) = (self.end_time, last_fire) {
                    return last >= end;
                }
                false
            }
        }
    }
}

/// Parse and validate a seconds-resolution cron expression
pub fn parse_cron_expression(expression: &str) -> Result<CronSchedule, ScheduleError> {
    CronSchedule::from_str(expression).map_err(|e| ScheduleError::InvalidCronExpression {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// The default timezone for cron triggers that never picked one
pub fn default_timezone() -> Tz {
    chrono_tz::UTC
}

fn one_shot_next(
    fire_at: DateTime<Utc>,
    last_fire: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    if last_fire.is_some() {
        None
    } else {
        Some(fire_at)
    }
}

fn interval_next(
    period_seconds: u64,
    repeat: RepeatCount,
    last_fire: Option<DateTime<Utc>>,
    completed_firings: u32,
) -> Option<DateTime<Utc>> {
    // Times { count } means the initial firing plus `count` repeats
    if let RepeatCount::Times { count } = repeat {
        if completed_firings > count {
            return None;
        }
    }

    match last_fire {
        Some(last) => Some(last + Duration::seconds(period_seconds as i64)),
        None => Some(Utc::now()),
    }
}

fn cron_next(
    expression: &str,
    timezone: Tz,
    last_fire: Option<DateTime<Utc>>,
) -> Result<Option<DateTime<Utc>>, ScheduleError> {
    let schedule = parse_cron_expression(expression)?;

    // Evaluate in the trigger's timezone, report in UTC
    let reference = last_fire.unwrap_or_else(Utc::now);
    let reference_in_tz = reference.with_timezone(&timezone);

    let next_in_tz = schedule
        .after(&reference_in_tz)
        .next()
        .ok_or_else(|| ScheduleError::NoNextFireTime {
            trigger_kind: "cron".to_string(),
        })?;

    Ok(Some(next_in_tz.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(trigger: Trigger) -> ScheduleSpec {
        ScheduleSpec {
            trigger,
            end_time: None,
            priority: 0,
        }
    }

    #[test]
    fn test_parse_valid_cron_expression() {
        let result = parse_cron_expression("0 0 12 * * * *");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_invalid_cron_expression() {
        let result = parse_cron_expression("invalid");
        assert!(result.is_err());
    }

    #[test]
    fn test_default_timezone_is_utc() {
        assert_eq!(default_timezone().to_string(), "UTC");
    }

    #[test]
    fn test_immediate_first_firing_is_now() {
        let schedule = spec(Trigger::Immediate);
        let next = schedule.next_fire_time(None, 0).unwrap().unwrap();
        assert!((next - Utc::now()).num_seconds().abs() < 1);
    }

    #[test]
    fn test_immediate_never_fires_twice() {
        let schedule = spec(Trigger::Immediate);
        let next = schedule.next_fire_time(Some(Utc::now()), 1).unwrap();
        assert_eq!(next, None);
        assert!(schedule.is_complete(Some(Utc::now()), 1));
    }

    #[test]
    fn test_at_fires_at_requested_instant() {
        let fire_at = Utc::now() + Duration::hours(1);
        let schedule = spec(Trigger::At { fire_at });
        assert_eq!(schedule.next_fire_time(None, 0).unwrap(), Some(fire_at));
        assert_eq!(schedule.next_fire_time(Some(fire_at), 1).unwrap(), None);
    }

    #[test]
    fn test_interval_subsequent_firing() {
        let schedule = spec(Trigger::Interval {
            period_seconds: 60,
            repeat: RepeatCount::Forever,
        });
        let last = Utc::now();
        let next = schedule.next_fire_time(Some(last), 1).unwrap().unwrap();
        assert_eq!(next, last + Duration::seconds(60));
    }

    #[test]
    fn test_interval_repeat_count_exhausts() {
        // Times { count: 2 } fires three times in total
        let schedule = spec(Trigger::Interval {
            period_seconds: 10,
            repeat: RepeatCount::Times { count: 2 },
        });
        let last = Utc::now();
        assert!(schedule.next_fire_time(Some(last), 1).unwrap().is_some());
        assert!(schedule.next_fire_time(Some(last), 2).unwrap().is_some());
        assert_eq!(schedule.next_fire_time(Some(last), 3).unwrap(), None);
        assert!(schedule.is_complete(Some(last), 3));
    }

    #[test]
    fn test_interval_forever_never_completes() {
        let schedule = spec(Trigger::Interval {
            period_seconds: 60,
            repeat: RepeatCount::Forever,
        });
        assert!(!schedule.is_complete(None, 0));
        assert!(!schedule.is_complete(Some(Utc::now()), 10_000));
    }

    #[test]
    fn test_cron_next_is_in_the_future() {
        let schedule = spec(Trigger::Cron {
            expression: "0 0 12 * * * *".to_string(),
            timezone: default_timezone(),
        });
        let next = schedule.next_fire_time(None, 0).unwrap().unwrap();
        assert!(next > Utc::now());
    }

    #[test]
    fn test_end_time_cuts_off_firing() {
        let schedule = ScheduleSpec {
            trigger: Trigger::Cron {
                expression: "0 0 12 * * * *".to_string(),
                timezone: default_timezone(),
            },
            end_time: Some(Utc::now() - Duration::days(1)),
            priority: 0,
        };
        assert_eq!(schedule.next_fire_time(None, 0).unwrap(), None);
    }

    #[test]
    fn test_cron_is_complete_after_end_time() {
        let schedule = ScheduleSpec {
            trigger: Trigger::Cron {
                expression: "0 0 12 * * * *".to_string(),
                timezone: default_timezone(),
            },
            end_time: Some(Utc::now() - Duration::days(1)),
            priority: 0,
        };
        assert!(schedule.is_complete(Some(Utc::now()), 1));
    }
}

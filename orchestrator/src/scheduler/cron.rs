//! Timezone-aware cron evaluation
//!
//! Accepts the standard 5-field crontab form (`min hour dom month dow`) and a
//! 6-field form with a leading seconds field. All functions are pure.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use croner::Cron;

use crate::constants::tasks::{MAX_CRON_LENGTH, MAX_TIMEZONE_LENGTH};
use crate::errors::SchedulerError;

/// Occurrence searches that land on or before `after` (sub-second input,
/// DST folds) are retried from the returned instant at most this often.
const MAX_SEARCH_STEPS: usize = 4;

/// A parsed cron expression bound to a timezone
pub struct CronSchedule {
    expression: String,
    cron: Cron,
    timezone: Tz,
}

impl CronSchedule {
    pub fn parse(expression: &str, timezone: &str) -> Result<Self, SchedulerError> {
        let cron = parse_expression(expression)?;
        let timezone = parse_timezone(timezone)?;

        Ok(Self {
            expression: expression.trim().to_string(),
            cron,
            timezone,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// First trigger instant strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>, SchedulerError> {
        let mut cursor = after
            .with_nanosecond(0)
            .unwrap_or(after)
            .with_timezone(&self.timezone);

        for _ in 0..MAX_SEARCH_STEPS {
            let next = self
                .cron
                .find_next_occurrence(&cursor, false)
                .map_err(|e| self.invalid(e.to_string()))?;

            let next_utc = next.with_timezone(&Utc);
            if next_utc > after {
                return Ok(next_utc);
            }
            cursor = next;
        }

        Err(self.invalid(format!("no trigger found after {}", after)))
    }

    /// The next `count` trigger instants after `after`, in order
    pub fn upcoming(
        &self,
        after: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<DateTime<Utc>>, SchedulerError> {
        let mut instants = Vec::with_capacity(count);
        let mut cursor = after;
        for _ in 0..count {
            cursor = self.next_after(cursor)?;
            instants.push(cursor);
        }
        Ok(instants)
    }

    fn invalid(&self, reason: String) -> SchedulerError {
        SchedulerError::InvalidSchedule {
            expression: self.expression.clone(),
            reason,
        }
    }
}

pub fn parse_timezone(timezone: &str) -> Result<Tz, SchedulerError> {
    let name = timezone.trim();
    if name.is_empty() || name.len() > MAX_TIMEZONE_LENGTH {
        return Err(SchedulerError::InvalidSchedule {
            expression: timezone.to_string(),
            reason: "timezone must be a valid IANA name".to_string(),
        });
    }

    name.parse::<Tz>()
        .map_err(|e| SchedulerError::InvalidSchedule {
            expression: timezone.to_string(),
            reason: format!("unknown timezone: {}", e),
        })
}

pub fn parse_expression(expression: &str) -> Result<Cron, SchedulerError> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(SchedulerError::InvalidSchedule {
            expression: expression.to_string(),
            reason: "cron expression is empty".to_string(),
        });
    }
    if trimmed.len() > MAX_CRON_LENGTH {
        return Err(SchedulerError::InvalidSchedule {
            expression: expression.to_string(),
            reason: format!("cron expression exceeds {} characters", MAX_CRON_LENGTH),
        });
    }

    Cron::new(trimmed)
        .with_seconds_optional()
        .parse()
        .map_err(|e| SchedulerError::InvalidSchedule {
            expression: expression.to_string(),
            reason: e.to_string(),
        })
}

/// Checks both halves of a schedule; used by task validation
pub fn validate_schedule(expression: &str, timezone: &str) -> Result<(), SchedulerError> {
    CronSchedule::parse(expression, timezone).map(|_| ())
}

/// Next trigger strictly after `after`
pub fn next_trigger(
    expression: &str,
    timezone: &str,
    after: DateTime<Utc>,
) -> Result<DateTime<Utc>, SchedulerError> {
    CronSchedule::parse(expression, timezone)?.next_after(after)
}

pub fn upcoming(
    expression: &str,
    timezone: &str,
    after: DateTime<Utc>,
    count: usize,
) -> Result<Vec<DateTime<Utc>>, SchedulerError> {
    CronSchedule::parse(expression, timezone)?.upcoming(after, count)
}

//! Periodic jobs: fixed-interval and crontab-style triggers.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, TimeDelta, Timelike};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace};

use crate::core::worker_pool::panic_message;
use crate::core::{AppResult, JobDescriptor, JobHook, PipelineError};
use crate::util::clock::Clock;

/// How often a crontab routine re-reads the clock.
pub const CRON_TICK: Duration = Duration::from_secs(60);

/// User-facing routine schedule parameters.
///
/// Either `interval` (minutes) or at least one crontab field must be set,
/// never both. Unset crontab fields match any value.
///
/// ```
/// use prometheus_pipeline::core::RoutineSpec;
///
/// let hourly = RoutineSpec::crontab().with_minute(0);
/// assert!(hourly.schedule().is_ok());
/// assert!(RoutineSpec::default().schedule().is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutineSpec {
    /// Minutes between invocations.
    pub interval: Option<f64>,
    /// Run once right away instead of waiting for the first trigger.
    pub immediately: bool,
    /// Day of month, `1..=31`.
    pub day: Option<u32>,
    /// Day of week, `0..=6` with Monday as 0.
    pub weekday: Option<u32>,
    /// Hour, `0..=23`.
    pub hour: Option<u32>,
    /// Minute, `0..=59`.
    pub minute: Option<u32>,
}

impl RoutineSpec {
    /// Run every `minutes` minutes.
    #[must_use]
    pub fn every_minutes(minutes: f64) -> Self {
        Self {
            interval: Some(minutes),
            ..Self::default()
        }
    }

    /// Crontab-style spec; add fields with the `with_*` methods.
    #[must_use]
    pub fn crontab() -> Self {
        Self::default()
    }

    /// Skip the first wait.
    #[must_use]
    pub const fn immediately(mut self) -> Self {
        self.immediately = true;
        self
    }

    /// Match this day of month.
    #[must_use]
    pub const fn with_day(mut self, day: u32) -> Self {
        self.day = Some(day);
        self
    }

    /// Match this day of week (Monday = 0).
    #[must_use]
    pub const fn with_weekday(mut self, weekday: u32) -> Self {
        self.weekday = Some(weekday);
        self
    }

    /// Match this hour.
    #[must_use]
    pub const fn with_hour(mut self, hour: u32) -> Self {
        self.hour = Some(hour);
        self
    }

    /// Match this minute.
    #[must_use]
    pub const fn with_minute(mut self, minute: u32) -> Self {
        self.minute = Some(minute);
        self
    }

    /// Validate into a schedule.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvalidSchedule` when neither or both trigger
    /// kinds are given, the interval is not a positive finite number, or a
    /// crontab field is out of range.
    pub fn schedule(&self) -> Result<RoutineSchedule, PipelineError> {
        let fields = CronFields {
            day: self.day,
            weekday: self.weekday,
            hour: self.hour,
            minute: self.minute,
        };
        match (self.interval, fields.is_empty()) {
            (Some(_), false) => Err(PipelineError::InvalidSchedule(
                "interval and crontab fields are mutually exclusive".into(),
            )),
            (None, true) => Err(PipelineError::InvalidSchedule(
                "either interval or one of day/weekday/hour/minute is required".into(),
            )),
            (Some(minutes), true) => {
                if !minutes.is_finite() || minutes <= 0.0 {
                    return Err(PipelineError::InvalidSchedule(format!(
                        "interval must be a positive number of minutes, got {minutes}"
                    )));
                }
                let period = Duration::try_from_secs_f64(minutes * 60.0)
                    .map_err(|e| PipelineError::InvalidSchedule(e.to_string()))?;
                Ok(RoutineSchedule::Interval {
                    period,
                    immediately: self.immediately,
                })
            }
            (None, false) => {
                fields.validate()?;
                Ok(RoutineSchedule::Crontab {
                    fields,
                    immediately: self.immediately,
                })
            }
        }
    }
}

/// Crontab fields; `None` is a wildcard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CronFields {
    /// Day of month.
    pub day: Option<u32>,
    /// Day of week, Monday = 0.
    pub weekday: Option<u32>,
    /// Hour.
    pub hour: Option<u32>,
    /// Minute.
    pub minute: Option<u32>,
}

impl CronFields {
    const fn is_empty(&self) -> bool {
        self.day.is_none() && self.weekday.is_none() && self.hour.is_none() && self.minute.is_none()
    }

    fn validate(&self) -> Result<(), PipelineError> {
        let checks = [
            ("day", self.day, 1, 31),
            ("weekday", self.weekday, 0, 6),
            ("hour", self.hour, 0, 23),
            ("minute", self.minute, 0, 59),
        ];
        for (field, value, min, max) in checks {
            if let Some(v) = value {
                if !(min..=max).contains(&v) {
                    return Err(PipelineError::InvalidSchedule(format!(
                        "{field} must be in {min}..={max}, got {v}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether every set field equals the corresponding part of `now`.
    #[must_use]
    pub fn matches(&self, now: &NaiveDateTime) -> bool {
        self.day.is_none_or(|d| d == now.day())
            && self
                .weekday
                .is_none_or(|w| w == now.weekday().num_days_from_monday())
            && self.hour.is_none_or(|h| h == now.hour())
            && self.minute.is_none_or(|m| m == now.minute())
    }
}

/// A validated routine schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoutineSchedule {
    /// Invoke every `period`.
    Interval {
        /// Time between invocations.
        period: Duration,
        /// Invoke before the first wait.
        immediately: bool,
    },
    /// Check the clock every minute; invoke when the fields match.
    Crontab {
        /// Fields to match.
        fields: CronFields,
        /// Check before the first wait.
        immediately: bool,
    },
}

/// A routine job bound to its schedule.
pub(crate) struct Routine<F> {
    pub name: String,
    pub schedule: RoutineSchedule,
    pub job: F,
    pub clock: Arc<dyn Clock>,
    pub hook: Option<Arc<JobHook>>,
    pub descriptor: Option<JobDescriptor>,
    pub launched: NaiveDateTime,
}

impl<F, Fut> Routine<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    /// Run forever.
    pub async fn run(self) {
        info!(routine = %self.name, schedule = ?self.schedule, "routine started");
        match self.schedule {
            RoutineSchedule::Interval {
                period,
                immediately,
            } => {
                if !immediately {
                    tokio::time::sleep(period).await;
                }
                loop {
                    let next = TimeDelta::from_std(period)
                        .ok()
                        .and_then(|delta| self.clock.now().checked_add_signed(delta));
                    self.invoke(next).await;
                    tokio::time::sleep(period).await;
                }
            }
            RoutineSchedule::Crontab {
                fields,
                immediately,
            } => {
                let mut skip_wait = immediately;
                loop {
                    if !skip_wait {
                        tokio::time::sleep(CRON_TICK).await;
                    }
                    skip_wait = false;

                    let now = self.clock.now();
                    if fields.matches(&now) {
                        let next = TimeDelta::from_std(CRON_TICK)
                            .ok()
                            .and_then(|delta| now.checked_add_signed(delta));
                        self.invoke(next).await;
                    } else {
                        trace!(routine = %self.name, %now, "crontab fields do not match");
                    }
                }
            }
        }
    }

    async fn invoke(&self, next_run: Option<NaiveDateTime>) {
        if let (Some(hook), Some(job)) = (&self.hook, &self.descriptor) {
            hook.record(job, self.launched, next_run).await;
        }

        match AssertUnwindSafe((self.job)()).catch_unwind().await {
            Ok(Ok(())) => debug!(routine = %self.name, "routine job finished"),
            Ok(Err(e)) => error!(
                routine = %self.name,
                error = format!("{e:#}"),
                root_cause = %e.root_cause(),
                "routine job failed"
            ),
            Err(panic) => error!(
                routine = %self.name,
                panic = %panic_message(panic.as_ref()),
                "routine job panicked"
            ),
        }
    }
}

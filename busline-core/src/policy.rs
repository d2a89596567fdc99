use busline_shared::Departure;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::{CoreError, CoreResult};

/// Time rules shared by the booking workflow, the reaper and the categorizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookingPolicy {
    /// Zone the schedule dates and times are written in.
    pub tz: Tz,
    /// How long after departure a trip still counts as active.
    pub grace: Duration,
    /// How far in the past a departure may be and still list as upcoming.
    pub history_window: Duration,
}

impl BookingPolicy {
    pub const DEFAULT_GRACE_MINUTES: i64 = 15;
    pub const DEFAULT_HISTORY_WINDOW_MINUTES: i64 = 60;

    pub fn new(tz: Tz, grace_minutes: i64, history_window_minutes: i64) -> CoreResult<Self> {
        if grace_minutes < 0 {
            return Err(CoreError::Validation(format!(
                "grace window must not be negative, got {} minutes",
                grace_minutes
            )));
        }
        if history_window_minutes < 0 {
            return Err(CoreError::Validation(format!(
                "history window must not be negative, got {} minutes",
                history_window_minutes
            )));
        }

        Ok(Self {
            tz,
            grace: Duration::minutes(grace_minutes),
            history_window: Duration::minutes(history_window_minutes),
        })
    }

    pub fn parse_timezone(name: &str) -> CoreResult<Tz> {
        name.parse::<Tz>()
            .map_err(|_| CoreError::Validation(format!("Unknown time zone: {}", name)))
    }

    /// Wall-clock time in the operator's zone.
    pub fn local_now(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&self.tz).naive_local()
    }

    /// Schedules departing strictly before this local time are expired.
    pub fn expiry_cutoff(&self, now: DateTime<Utc>) -> NaiveDateTime {
        self.local_now(now) - self.grace
    }

    pub fn is_expired(&self, departure: &Departure, now: DateTime<Utc>) -> bool {
        departure.is_expired(self.local_now(now), self.grace)
    }
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            tz: chrono_tz::UTC,
            grace: Duration::minutes(Self::DEFAULT_GRACE_MINUTES),
            history_window: Duration::minutes(Self::DEFAULT_HISTORY_WINDOW_MINUTES),
        }
    }
}

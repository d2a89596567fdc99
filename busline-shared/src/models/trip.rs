use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::{BusId, ScheduleId};

/// Scheduled departure as stored: a wall-clock date and time of day in the
/// operator's time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Departure {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl Departure {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, time }
    }

    pub fn local(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    /// Resolves the wall-clock departure in `tz`. Ambiguous times (clocks
    /// turned back) resolve to the earlier instant; times that do not exist
    /// in the zone (clocks turned forward) resolve to `None`.
    pub fn instant<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        tz.from_local_datetime(&self.local()).earliest()
    }

    /// A trip is expired once local wall-clock time passes departure plus the
    /// grace window.
    pub fn is_expired(&self, now_local: NaiveDateTime, grace: Duration) -> bool {
        now_local > self.local() + grace
    }
}

/// The parts of a schedule the booking workflow needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSlot {
    pub schedule_id: ScheduleId,
    pub bus_id: BusId,
    pub departure: Departure,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffContact {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
}

/// Schedule joined with its bus, route and crew.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripDetails {
    pub schedule_id: ScheduleId,
    pub bus_id: BusId,
    pub bus_name: String,
    pub bus_number: String,
    pub bus_type: String,
    pub departure: Departure,
    pub source: String,
    pub destination: String,
    pub via: Option<String>,
    pub driver: StaffContact,
    pub helper: StaffContact,
}

impl TripDetails {
    pub fn bus_info(&self) -> BusInfo {
        BusInfo {
            bus_name: self.bus_name.clone(),
            bus_number: self.bus_number.clone(),
            bus_type: self.bus_type.clone(),
            time: self.departure.time,
            source: self.source.clone(),
            destination: self.destination.clone(),
            via: self.via.clone(),
            driver: self.driver.clone(),
            helper: self.helper.clone(),
        }
    }
}

/// Trip metadata shown next to a seat map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusInfo {
    pub bus_name: String,
    pub bus_number: String,
    pub bus_type: String,
    pub time: NaiveTime,
    pub source: String,
    pub destination: String,
    pub via: Option<String>,
    pub driver: StaffContact,
    pub helper: StaffContact,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn departure(date: &str, time: &str) -> Departure {
        Departure::new(
            NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
        )
    }

    #[test]
    fn test_expiry_uses_grace_window() {
        let dep = departure("2024-01-10", "10:00");
        let grace = Duration::minutes(15);

        assert!(!dep.is_expired(dep.local() + Duration::minutes(15), grace));
        assert!(dep.is_expired(dep.local() + Duration::minutes(16), grace));
        assert!(!dep.is_expired(dep.local() - Duration::hours(1), grace));
    }

    #[test]
    fn test_instant_in_fixed_zone() {
        let dep = departure("2024-01-10", "10:00");
        let tz = FixedOffset::east_opt(6 * 3600).unwrap();
        let instant = dep.instant(&tz).unwrap();

        assert_eq!(instant.naive_utc().to_string(), "2024-01-10 04:00:00");
    }
}

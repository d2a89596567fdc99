use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::seat::SeatCoord;
use super::trip::Departure;
use crate::{BusId, ScheduleId};

/// An existing booking as seen by the conflict check and edit flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldBooking {
    pub booking_id: Uuid,
    pub schedule_id: ScheduleId,
    pub seat: SeatCoord,
}

/// Row to insert when a reservation is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub booking_id: Uuid,
    pub user_id: String,
    pub schedule_id: ScheduleId,
    pub seat: SeatCoord,
    pub booked_at: DateTime<Utc>,
}

impl NewBooking {
    pub fn new(user_id: &str, schedule_id: ScheduleId, seat: SeatCoord) -> Self {
        Self {
            booking_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            schedule_id,
            seat,
            booked_at: Utc::now(),
        }
    }
}

/// A user's booking joined with its trip, as listed under "my bookings".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripBooking {
    pub booking_id: Uuid,
    pub user_id: String,
    pub schedule_id: ScheduleId,
    pub r_number: String,
    pub column_number: i32,
    pub booking_time: DateTime<Utc>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub source: String,
    pub destination: String,
    pub via: Option<String>,
    pub bus_name: String,
    pub bus_number: String,
}

impl TripBooking {
    pub fn departure(&self) -> Departure {
        Departure::new(self.date, self.time)
    }
}

/// A schedule whose grace window has elapsed and whose bus still needs its
/// seats released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredTrip {
    pub schedule_id: ScheduleId,
    pub bus_id: BusId,
    pub departure: Departure,
}

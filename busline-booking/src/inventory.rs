use busline_core::{CoreError, CoreResult, TripDirectory};
use busline_shared::{BusInfo, ScheduleId, Seat, SeatCoord};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Seat map of a schedule's bus plus the trip it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatInventoryView {
    pub seats: Vec<Seat>,
    pub bus_info: BusInfo,
    pub already_booked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booked_seat: Option<SeatCoord>,
}

pub struct SeatInventory {
    directory: Arc<dyn TripDirectory>,
}

impl SeatInventory {
    pub fn new(directory: Arc<dyn TripDirectory>) -> Self {
        Self { directory }
    }

    /// Builds the seat map for `schedule_id`, overlaid with `user_id`'s
    /// booking on it when a user is given.
    ///
    /// An unknown schedule and a bus without seats are both `NotFound`;
    /// storage failures stay `Storage`.
    pub async fn view(&self, schedule_id: ScheduleId, user_id: Option<&str>) -> CoreResult<SeatInventoryView> {
        let trip = self
            .directory
            .trip_details(schedule_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Schedule {}", schedule_id)))?;

        let seats = self.directory.seats_for_bus(trip.bus_id).await?;
        if seats.is_empty() {
            return Err(CoreError::NotFound(format!("Seats for bus {}", trip.bus_id)));
        }

        let booked_seat = match user_id.map(str::trim).filter(|u| !u.is_empty()) {
            Some(user) => self.directory.booking_for(user, schedule_id).await?,
            None => None,
        };

        debug!(
            "Seat map for schedule {}: {} seats, {} unavailable",
            schedule_id,
            seats.len(),
            seats.iter().filter(|s| !s.status.is_available()).count()
        );

        Ok(SeatInventoryView {
            seats,
            bus_info: trip.bus_info(),
            already_booked: booked_seat.is_some(),
            booked_seat,
        })
    }
}

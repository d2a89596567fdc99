use async_trait::async_trait;
use busline_shared::{
    BusId, ExpiredTrip, HeldBooking, NewBooking, ScheduleId, ScheduleSlot, Seat, SeatCoord,
    SeatStatus, TripBooking, TripDetails,
};
use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

use crate::CoreResult;

/// Entry point to transactional writes on bookings and seats.
#[async_trait]
pub trait SeatLedger: Send + Sync {
    /// Opens a transaction. Nothing written through it is visible to others
    /// until `commit`; dropping it without committing rolls back.
    async fn begin(&self) -> CoreResult<Box<dyn LedgerTx>>;
}

/// One open storage transaction. Reads that take locks hold them until the
/// transaction ends.
#[async_trait]
pub trait LedgerTx: Send {
    /// Serializes reservation attempts by the same user until the transaction
    /// ends, so two concurrent requests cannot both pass the conflict check.
    async fn lock_user(&mut self, user_id: &str) -> CoreResult<()>;

    /// Reads a schedule and blocks concurrent deletion of it.
    async fn schedule(&mut self, schedule_id: ScheduleId) -> CoreResult<Option<ScheduleSlot>>;

    /// The user's bookings on schedules departing at `time` of day, any date.
    async fn bookings_at_time(&mut self, user_id: &str, time: NaiveTime) -> CoreResult<Vec<HeldBooking>>;

    /// The user's booking on a schedule, locked for update.
    async fn find_booking(&mut self, user_id: &str, schedule_id: ScheduleId) -> CoreResult<Option<HeldBooking>>;

    /// Locks a seat row and returns its status, or `None` if the bus has no
    /// such seat.
    async fn lock_seat(&mut self, bus_id: BusId, seat: &SeatCoord) -> CoreResult<Option<SeatStatus>>;

    async fn insert_booking(&mut self, booking: &NewBooking) -> CoreResult<()>;

    /// Moves a booking to another seat and refreshes its timestamp.
    async fn move_booking(&mut self, booking_id: Uuid, seat: &SeatCoord, booked_at: DateTime<Utc>) -> CoreResult<()>;

    async fn set_seat_status(&mut self, bus_id: BusId, seat: &SeatCoord, status: SeatStatus) -> CoreResult<()>;

    /// Locks every seat row of a bus. Returns the number of seats locked.
    async fn lock_bus_seats(&mut self, bus_id: BusId) -> CoreResult<u64>;

    /// Marks available every unavailable seat of the bus that no booking on a
    /// schedule departing at or after `cutoff` still references. Returns the
    /// number of seats released.
    async fn release_stale_seats(&mut self, bus_id: BusId, cutoff: NaiveDateTime) -> CoreResult<u64>;

    async fn mark_reaped(&mut self, schedule_ids: &[ScheduleId], at: DateTime<Utc>) -> CoreResult<()>;

    async fn commit(self: Box<Self>) -> CoreResult<()>;

    async fn rollback(self: Box<Self>) -> CoreResult<()>;
}

/// Read-only lookups backing the seat map, booking history and reaper scan.
#[async_trait]
pub trait TripDirectory: Send + Sync {
    async fn trip_details(&self, schedule_id: ScheduleId) -> CoreResult<Option<TripDetails>>;

    async fn seats_for_bus(&self, bus_id: BusId) -> CoreResult<Vec<Seat>>;

    async fn booking_for(&self, user_id: &str, schedule_id: ScheduleId) -> CoreResult<Option<SeatCoord>>;

    async fn bookings_for_user(&self, user_id: &str) -> CoreResult<Vec<TripBooking>>;

    /// Schedules departing before `cutoff` that no sweep has processed yet.
    async fn expired_schedules(&self, cutoff: NaiveDateTime) -> CoreResult<Vec<ExpiredTrip>>;

    async fn ping(&self) -> CoreResult<()>;
}

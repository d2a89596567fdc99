use async_trait::async_trait;
use busline_core::{CoreError, CoreResult, LedgerTx, SeatLedger, TripDirectory};
use busline_shared::{
    BusId, Departure, ExpiredTrip, HeldBooking, NewBooking, ScheduleId, ScheduleSlot, Seat,
    SeatCoord, SeatLayout, SeatStatus, StaffContact, TripBooking, TripDetails,
};
use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone)]
pub struct BusRecord {
    pub bus_id: BusId,
    pub bus_name: String,
    pub bus_number: String,
    pub bus_type: String,
}

#[derive(Debug, Clone)]
pub struct RouteRecord {
    pub route_id: i64,
    pub source: String,
    pub destination: String,
    pub via: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StaffRecord {
    pub staff_id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScheduleRecord {
    pub schedule_id: ScheduleId,
    pub bus_id: BusId,
    pub route_id: i64,
    pub driver_id: Option<i64>,
    pub helper_id: Option<i64>,
    pub departure: Departure,
}

#[derive(Debug, Clone)]
struct StoredSchedule {
    record: ScheduleRecord,
    reaped_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct StoredBooking {
    user_id: String,
    schedule_id: ScheduleId,
    seat: SeatCoord,
    booked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    buses: BTreeMap<BusId, BusRecord>,
    routes: BTreeMap<i64, RouteRecord>,
    staff: BTreeMap<i64, StaffRecord>,
    schedules: BTreeMap<ScheduleId, StoredSchedule>,
    seats: BTreeMap<(BusId, SeatCoord), SeatStatus>,
    bookings: BTreeMap<Uuid, StoredBooking>,
}

impl MemoryState {
    fn held(&self, booking_id: Uuid, booking: &StoredBooking) -> HeldBooking {
        HeldBooking {
            booking_id,
            schedule_id: booking.schedule_id,
            seat: booking.seat.clone(),
        }
    }

    fn contact(&self, staff_id: Option<i64>) -> StaffContact {
        staff_id
            .and_then(|id| self.staff.get(&id))
            .map(|s| StaffContact {
                name: Some(s.name.clone()),
                phone: s.phone.clone(),
                location: s.location.clone(),
            })
            .unwrap_or_default()
    }
}

// ============================================================================
// Store
// ============================================================================

/// In-process implementation of the storage traits.
///
/// A transaction takes the store lock for its whole lifetime and works on a
/// private copy of the state, so transactions are serialized and a commit
/// publishes all of its writes at once.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_next_seat_update: Arc<AtomicBool>,
    fail_next_commit: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bus and generates its seats, all available.
    pub async fn add_bus(&self, bus: BusRecord, layout: &SeatLayout) {
        let mut state = self.state.lock().await;
        for coord in layout.coords() {
            state.seats.insert((bus.bus_id, coord), SeatStatus::Available);
        }
        state.buses.insert(bus.bus_id, bus);
    }

    pub async fn add_route(&self, route: RouteRecord) {
        self.state.lock().await.routes.insert(route.route_id, route);
    }

    pub async fn add_staff(&self, staff: StaffRecord) {
        self.state.lock().await.staff.insert(staff.staff_id, staff);
    }

    pub async fn add_schedule(&self, schedule: ScheduleRecord) {
        self.state.lock().await.schedules.insert(
            schedule.schedule_id,
            StoredSchedule {
                record: schedule,
                reaped_at: None,
            },
        );
    }

    pub async fn seat_status(&self, bus_id: BusId, seat: &SeatCoord) -> Option<SeatStatus> {
        self.state.lock().await.seats.get(&(bus_id, seat.clone())).copied()
    }

    pub async fn set_seat(&self, bus_id: BusId, seat: &SeatCoord, status: SeatStatus) {
        self.state.lock().await.seats.insert((bus_id, seat.clone()), status);
    }

    pub async fn bookings_on(&self, schedule_id: ScheduleId) -> Vec<HeldBooking> {
        let state = self.state.lock().await;
        state
            .bookings
            .iter()
            .filter(|(_, b)| b.schedule_id == schedule_id)
            .map(|(id, b)| state.held(*id, b))
            .collect()
    }

    pub async fn booking_count(&self) -> usize {
        self.state.lock().await.bookings.len()
    }

    pub async fn is_reaped(&self, schedule_id: ScheduleId) -> bool {
        self.state
            .lock()
            .await
            .schedules
            .get(&schedule_id)
            .map(|s| s.reaped_at.is_some())
            .unwrap_or(false)
    }

    /// Makes the next seat status write fail with a storage error.
    pub fn fail_next_seat_update(&self) {
        self.fail_next_seat_update.store(true, Ordering::SeqCst);
    }

    /// Makes the next commit fail with a storage error and discard its writes.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SeatLedger for MemoryStore {
    async fn begin(&self) -> CoreResult<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            fail_next_seat_update: self.fail_next_seat_update.clone(),
            fail_next_commit: self.fail_next_commit.clone(),
        }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_next_seat_update: Arc<AtomicBool>,
    fail_next_commit: Arc<AtomicBool>,
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_user(&mut self, _user_id: &str) -> CoreResult<()> {
        Ok(())
    }

    async fn schedule(&mut self, schedule_id: ScheduleId) -> CoreResult<Option<ScheduleSlot>> {
        Ok(self.working.schedules.get(&schedule_id).map(|s| ScheduleSlot {
            schedule_id,
            bus_id: s.record.bus_id,
            departure: s.record.departure,
        }))
    }

    async fn bookings_at_time(&mut self, user_id: &str, time: NaiveTime) -> CoreResult<Vec<HeldBooking>> {
        let state = &self.working;
        Ok(state
            .bookings
            .iter()
            .filter(|(_, b)| b.user_id == user_id)
            .filter(|(_, b)| {
                state
                    .schedules
                    .get(&b.schedule_id)
                    .map(|s| s.record.departure.time == time)
                    .unwrap_or(false)
            })
            .map(|(id, b)| state.held(*id, b))
            .collect())
    }

    async fn find_booking(&mut self, user_id: &str, schedule_id: ScheduleId) -> CoreResult<Option<HeldBooking>> {
        let state = &self.working;
        Ok(state
            .bookings
            .iter()
            .find(|(_, b)| b.user_id == user_id && b.schedule_id == schedule_id)
            .map(|(id, b)| state.held(*id, b)))
    }

    async fn lock_seat(&mut self, bus_id: BusId, seat: &SeatCoord) -> CoreResult<Option<SeatStatus>> {
        Ok(self.working.seats.get(&(bus_id, seat.clone())).copied())
    }

    async fn insert_booking(&mut self, booking: &NewBooking) -> CoreResult<()> {
        let taken = self
            .working
            .bookings
            .values()
            .any(|b| b.schedule_id == booking.schedule_id && b.seat == booking.seat);
        if taken {
            return Err(CoreError::SeatUnavailable(booking.seat.clone()));
        }

        self.working.bookings.insert(
            booking.booking_id,
            StoredBooking {
                user_id: booking.user_id.clone(),
                schedule_id: booking.schedule_id,
                seat: booking.seat.clone(),
                booked_at: booking.booked_at,
            },
        );
        Ok(())
    }

    async fn move_booking(&mut self, booking_id: Uuid, seat: &SeatCoord, booked_at: DateTime<Utc>) -> CoreResult<()> {
        let schedule_id = self
            .working
            .bookings
            .get(&booking_id)
            .map(|b| b.schedule_id)
            .ok_or_else(|| CoreError::NotFound(format!("Booking {}", booking_id)))?;

        let taken = self
            .working
            .bookings
            .iter()
            .any(|(id, b)| *id != booking_id && b.schedule_id == schedule_id && &b.seat == seat);
        if taken {
            return Err(CoreError::SeatUnavailable(seat.clone()));
        }

        if let Some(booking) = self.working.bookings.get_mut(&booking_id) {
            booking.seat = seat.clone();
            booking.booked_at = booked_at;
        }
        Ok(())
    }

    async fn set_seat_status(&mut self, bus_id: BusId, seat: &SeatCoord, status: SeatStatus) -> CoreResult<()> {
        if self.fail_next_seat_update.swap(false, Ordering::SeqCst) {
            return Err(CoreError::Storage("injected seat update failure".to_string()));
        }

        match self.working.seats.get_mut(&(bus_id, seat.clone())) {
            Some(current) => {
                *current = status;
                Ok(())
            }
            None => Err(CoreError::NotFound(format!("Seat {} on bus {}", seat, bus_id))),
        }
    }

    async fn lock_bus_seats(&mut self, bus_id: BusId) -> CoreResult<u64> {
        Ok(self.working.seats.keys().filter(|(bus, _)| *bus == bus_id).count() as u64)
    }

    async fn release_stale_seats(&mut self, bus_id: BusId, cutoff: NaiveDateTime) -> CoreResult<u64> {
        let state = &mut self.working;

        let held: BTreeSet<SeatCoord> = state
            .bookings
            .values()
            .filter(|b| {
                state
                    .schedules
                    .get(&b.schedule_id)
                    .map(|s| s.record.bus_id == bus_id && s.record.departure.local() >= cutoff)
                    .unwrap_or(false)
            })
            .map(|b| b.seat.clone())
            .collect();

        let mut released = 0;
        for ((bus, coord), status) in state.seats.iter_mut() {
            if *bus == bus_id && *status == SeatStatus::Unavailable && !held.contains(coord) {
                *status = SeatStatus::Available;
                released += 1;
            }
        }
        Ok(released)
    }

    async fn mark_reaped(&mut self, schedule_ids: &[ScheduleId], at: DateTime<Utc>) -> CoreResult<()> {
        for id in schedule_ids {
            if let Some(schedule) = self.working.schedules.get_mut(id) {
                schedule.reaped_at = Some(at);
            }
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(CoreError::Storage("injected commit failure".to_string()));
        }
        let MemoryTx { mut guard, working, .. } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> CoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl TripDirectory for MemoryStore {
    async fn trip_details(&self, schedule_id: ScheduleId) -> CoreResult<Option<TripDetails>> {
        let state = self.state.lock().await;
        let Some(schedule) = state.schedules.get(&schedule_id) else {
            return Ok(None);
        };
        let record = &schedule.record;
        let (Some(bus), Some(route)) = (state.buses.get(&record.bus_id), state.routes.get(&record.route_id)) else {
            return Ok(None);
        };

        Ok(Some(TripDetails {
            schedule_id,
            bus_id: bus.bus_id,
            bus_name: bus.bus_name.clone(),
            bus_number: bus.bus_number.clone(),
            bus_type: bus.bus_type.clone(),
            departure: record.departure,
            source: route.source.clone(),
            destination: route.destination.clone(),
            via: route.via.clone(),
            driver: state.contact(record.driver_id),
            helper: state.contact(record.helper_id),
        }))
    }

    async fn seats_for_bus(&self, bus_id: BusId) -> CoreResult<Vec<Seat>> {
        let state = self.state.lock().await;
        Ok(state
            .seats
            .iter()
            .filter(|((bus, _), _)| *bus == bus_id)
            .map(|((_, coord), status)| Seat {
                r_number: coord.r_number.clone(),
                column_number: coord.column_number,
                status: *status,
            })
            .collect())
    }

    async fn booking_for(&self, user_id: &str, schedule_id: ScheduleId) -> CoreResult<Option<SeatCoord>> {
        let state = self.state.lock().await;
        Ok(state
            .bookings
            .values()
            .find(|b| b.user_id == user_id && b.schedule_id == schedule_id)
            .map(|b| b.seat.clone()))
    }

    async fn bookings_for_user(&self, user_id: &str) -> CoreResult<Vec<TripBooking>> {
        let state = self.state.lock().await;
        let mut rows: Vec<TripBooking> = state
            .bookings
            .iter()
            .filter(|(_, b)| b.user_id == user_id)
            .filter_map(|(id, b)| {
                let schedule = &state.schedules.get(&b.schedule_id)?.record;
                let bus = state.buses.get(&schedule.bus_id)?;
                let route = state.routes.get(&schedule.route_id)?;
                Some(TripBooking {
                    booking_id: *id,
                    user_id: b.user_id.clone(),
                    schedule_id: b.schedule_id,
                    r_number: b.seat.r_number.clone(),
                    column_number: b.seat.column_number,
                    booking_time: b.booked_at,
                    date: schedule.departure.date,
                    time: schedule.departure.time,
                    source: route.source.clone(),
                    destination: route.destination.clone(),
                    via: route.via.clone(),
                    bus_name: bus.bus_name.clone(),
                    bus_number: bus.bus_number.clone(),
                })
            })
            .collect();
        rows.sort_by_key(|r| (r.date, r.time, r.schedule_id));
        Ok(rows)
    }

    async fn expired_schedules(&self, cutoff: NaiveDateTime) -> CoreResult<Vec<ExpiredTrip>> {
        let state = self.state.lock().await;
        Ok(state
            .schedules
            .values()
            .filter(|s| s.reaped_at.is_none() && s.record.departure.local() < cutoff)
            .map(|s| ExpiredTrip {
                schedule_id: s.record.schedule_id,
                bus_id: s.record.bus_id,
                departure: s.record.departure,
            })
            .collect())
    }

    async fn ping(&self) -> CoreResult<()> {
        Ok(())
    }
}

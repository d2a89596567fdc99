use busline_core::{BookingPolicy, Clock, CoreError, CoreResult, LedgerTx, SeatLedger};
use busline_shared::{NewBooking, ScheduleId, ScheduleSlot, SeatCoord, SeatStatus};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::conflict::{ConflictDetector, ConflictOutcome};

/// A validated reservation request. `previous_seat` selects edit mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveRequest {
    pub schedule_id: ScheduleId,
    pub user_id: String,
    pub seat: SeatCoord,
    pub previous_seat: Option<SeatCoord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    Created { booking_id: Uuid, seat: SeatCoord },
    Moved { booking_id: Uuid, from: SeatCoord, to: SeatCoord },
    /// Edit to the seat already held; only the timestamp was refreshed.
    Unchanged { booking_id: Uuid, seat: SeatCoord },
}

impl Reservation {
    pub fn booking_id(&self) -> Uuid {
        match self {
            Reservation::Created { booking_id, .. }
            | Reservation::Moved { booking_id, .. }
            | Reservation::Unchanged { booking_id, .. } => *booking_id,
        }
    }
}

/// The only writer of bookings and seat statuses for the reservation
/// workflow. Every call runs in a single ledger transaction: it either commits
/// the booking row and the seat statuses together or leaves both untouched.
pub struct BookingCoordinator {
    ledger: Arc<dyn SeatLedger>,
    clock: Arc<dyn Clock>,
    policy: BookingPolicy,
}

impl BookingCoordinator {
    pub fn new(ledger: Arc<dyn SeatLedger>, clock: Arc<dyn Clock>, policy: BookingPolicy) -> Self {
        Self { ledger, clock, policy }
    }

    pub async fn reserve(&self, req: ReserveRequest) -> CoreResult<Reservation> {
        if req.user_id.trim().is_empty() {
            return Err(CoreError::Validation("Missing required field: userId".to_string()));
        }

        let mut tx = self.ledger.begin().await?;

        let staged = match tx.lock_user(&req.user_id).await {
            Err(e) => Err(e),
            Ok(()) => match &req.previous_seat {
                None => self.create(tx.as_mut(), &req).await,
                Some(previous) => self.amend(tx.as_mut(), &req, previous).await,
            },
        };

        // A failed commit discards the transaction like a rollback does
        let result = match staged {
            Ok(reservation) => tx.commit().await.map(|()| reservation),
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    warn!("Rollback failed after booking error: {}", rb);
                }
                Err(e)
            }
        };

        match result {
            Ok(reservation) => {
                match &reservation {
                    Reservation::Created { booking_id, seat } => {
                        info!("Booking {} created: user {} seat {} on schedule {}", booking_id, req.user_id, seat, req.schedule_id);
                    }
                    Reservation::Moved { booking_id, from, to } => {
                        info!("Booking {} moved from {} to {} on schedule {}", booking_id, from, to, req.schedule_id);
                    }
                    Reservation::Unchanged { booking_id, .. } => {
                        info!("Booking {} re-saved without seat change", booking_id);
                    }
                }
                Ok(reservation)
            }
            Err(e) => {
                warn!(kind = ?e.kind(), "Reservation rejected for user {} on schedule {}: {}", req.user_id, req.schedule_id, e);
                Err(e)
            }
        }
    }

    async fn create(&self, tx: &mut dyn LedgerTx, req: &ReserveRequest) -> CoreResult<Reservation> {
        let slot = self.active_schedule(tx, req.schedule_id).await?;

        // 1. One booking per user per departure time
        let conflict = ConflictDetector::check(tx, &req.user_id, slot.departure.time, None).await?;
        if let ConflictOutcome::Conflicting { booking_id } = conflict {
            return Err(CoreError::TimeSlotTaken { booking_id });
        }

        // 2. Re-check the seat under lock
        self.claimable(tx, &slot, &req.seat).await?;

        // 3. Booking row and seat status commit together
        let booking = NewBooking {
            booked_at: self.clock.now(),
            ..NewBooking::new(&req.user_id, slot.schedule_id, req.seat.clone())
        };
        tx.insert_booking(&booking).await?;
        tx.set_seat_status(slot.bus_id, &req.seat, SeatStatus::Unavailable).await?;

        Ok(Reservation::Created {
            booking_id: booking.booking_id,
            seat: req.seat.clone(),
        })
    }

    async fn amend(&self, tx: &mut dyn LedgerTx, req: &ReserveRequest, previous: &SeatCoord) -> CoreResult<Reservation> {
        let slot = self.active_schedule(tx, req.schedule_id).await?;

        let current = tx
            .find_booking(&req.user_id, slot.schedule_id)
            .await?
            .filter(|held| &held.seat == previous)
            .ok_or_else(|| {
                CoreError::NotFound(format!(
                    "No booking for user {} at seat {} on schedule {}",
                    req.user_id, previous, slot.schedule_id
                ))
            })?;

        // 1. Conflict check, ignoring the booking being edited
        let own = Some((slot.schedule_id, previous));
        let conflict = ConflictDetector::check(tx, &req.user_id, slot.departure.time, own).await?;
        if let ConflictOutcome::Conflicting { booking_id } = conflict {
            return Err(CoreError::TimeSlotTaken { booking_id });
        }

        let now = self.clock.now();

        if &req.seat == previous {
            tx.move_booking(current.booking_id, previous, now).await?;
            return Ok(Reservation::Unchanged {
                booking_id: current.booking_id,
                seat: previous.clone(),
            });
        }

        // 2. Lock both seats in a fixed order so concurrent swaps and the
        //    reaper's bus-wide lock cannot deadlock against this transaction.
        let (first, second) = if previous < &req.seat {
            (previous, &req.seat)
        } else {
            (&req.seat, previous)
        };
        tx.lock_seat(slot.bus_id, first).await?;
        tx.lock_seat(slot.bus_id, second).await?;
        self.claimable(tx, &slot, &req.seat).await?;

        // 3. Move the booking, free the old seat, claim the new one
        tx.move_booking(current.booking_id, &req.seat, now).await?;
        tx.set_seat_status(slot.bus_id, previous, SeatStatus::Available).await?;
        tx.set_seat_status(slot.bus_id, &req.seat, SeatStatus::Unavailable).await?;

        Ok(Reservation::Moved {
            booking_id: current.booking_id,
            from: previous.clone(),
            to: req.seat.clone(),
        })
    }

    async fn active_schedule(&self, tx: &mut dyn LedgerTx, schedule_id: ScheduleId) -> CoreResult<ScheduleSlot> {
        let slot = tx
            .schedule(schedule_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Schedule {}", schedule_id)))?;

        if self.policy.is_expired(&slot.departure, self.clock.now()) {
            return Err(CoreError::TripDeparted(schedule_id));
        }
        Ok(slot)
    }

    async fn claimable(&self, tx: &mut dyn LedgerTx, slot: &ScheduleSlot, seat: &SeatCoord) -> CoreResult<()> {
        match tx.lock_seat(slot.bus_id, seat).await? {
            Some(SeatStatus::Available) => Ok(()),
            Some(SeatStatus::Unavailable) => Err(CoreError::SeatUnavailable(seat.clone())),
            None => Err(CoreError::NotFound(format!("Seat {} on bus {}", seat, slot.bus_id))),
        }
    }
}

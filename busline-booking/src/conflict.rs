use busline_core::{CoreResult, LedgerTx};
use busline_shared::{HeldBooking, ScheduleId, SeatCoord};
use chrono::NaiveTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictOutcome {
    Clear,
    Conflicting { booking_id: Uuid },
}

impl ConflictOutcome {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ConflictOutcome::Conflicting { .. })
    }
}

/// Finds a user's other booking at the same departure time of day.
///
/// Only the clock time is compared, not the date: a user holding a 10:00 trip
/// on one day cannot book a 10:00 trip on another day.
pub struct ConflictDetector;

impl ConflictDetector {
    /// `own` identifies the booking being amended (its schedule and current
    /// seat) so that it never conflicts with itself.
    pub fn find_conflict(existing: &[HeldBooking], own: Option<(ScheduleId, &SeatCoord)>) -> ConflictOutcome {
        existing
            .iter()
            .find(|held| match own {
                Some((schedule_id, seat)) => !(held.schedule_id == schedule_id && &held.seat == seat),
                None => true,
            })
            .map(|held| ConflictOutcome::Conflicting { booking_id: held.booking_id })
            .unwrap_or(ConflictOutcome::Clear)
    }

    pub async fn check(
        tx: &mut dyn LedgerTx,
        user_id: &str,
        departure_time: NaiveTime,
        own: Option<(ScheduleId, &SeatCoord)>,
    ) -> CoreResult<ConflictOutcome> {
        let existing = tx.bookings_at_time(user_id, departure_time).await?;
        Ok(Self::find_conflict(&existing, own))
    }
}

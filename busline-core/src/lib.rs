pub mod clock;
pub mod policy;
pub mod repository;

pub use clock::{Clock, ManualClock, SystemClock};
pub use policy::BookingPolicy;
pub use repository::{LedgerTx, SeatLedger, TripDirectory};

use busline_shared::{ScheduleId, SeatCoord};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("You already have a booking at this time (booking {booking_id})")]
    TimeSlotTaken { booking_id: Uuid },
    #[error("Trip {0} has already departed")]
    TripDeparted(ScheduleId),
    #[error("Seat {0} is already booked or unavailable")]
    SeatUnavailable(SeatCoord),
    #[error("Storage failure: {0}")]
    Storage(String),
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    /// Lost the seat re-check to a concurrent transaction.
    RaceLost,
    Storage,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::TimeSlotTaken { .. } | CoreError::TripDeparted(_) => ErrorKind::Conflict,
            CoreError::SeatUnavailable(_) => ErrorKind::RaceLost,
            CoreError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        CoreError::Storage(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let seat = SeatCoord::new("A", 1).unwrap();

        assert_eq!(CoreError::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(CoreError::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(CoreError::TimeSlotTaken { booking_id: Uuid::nil() }.kind(), ErrorKind::Conflict);
        assert_eq!(CoreError::TripDeparted(7).kind(), ErrorKind::Conflict);
        assert_eq!(CoreError::SeatUnavailable(seat).kind(), ErrorKind::RaceLost);
        assert_eq!(CoreError::storage("connection reset").kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_seat_unavailable_message() {
        let err = CoreError::SeatUnavailable(SeatCoord::new("c", 4).unwrap());
        assert_eq!(err.to_string(), "Seat C4 is already booked or unavailable");
    }
}

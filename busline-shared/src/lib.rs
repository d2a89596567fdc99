pub mod models;

pub use models::booking::{ExpiredTrip, HeldBooking, NewBooking, TripBooking};
pub use models::seat::{Seat, SeatCoord, SeatLayout, SeatParseError, SeatStatus};
pub use models::trip::{BusInfo, Departure, ScheduleSlot, StaffContact, TripDetails};

pub type BusId = i64;
pub type ScheduleId = i64;

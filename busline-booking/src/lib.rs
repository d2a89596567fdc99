pub mod categorizer;
pub mod conflict;
pub mod coordinator;
pub mod inventory;
pub mod memory;
pub mod reaper;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use categorizer::{BookingCategorizer, CategorizedBookings};
pub use conflict::{ConflictDetector, ConflictOutcome};
pub use coordinator::{BookingCoordinator, Reservation, ReserveRequest};
pub use inventory::{SeatInventory, SeatInventoryView};
pub use memory::MemoryStore;
pub use reaper::{ReaperHandle, SweepReport, TripReaper};

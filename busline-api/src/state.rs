use std::sync::Arc;
use busline_booking::{BookingCategorizer, BookingCoordinator, SeatInventory};
use busline_core::{BookingPolicy, Clock, SeatLedger, TripDirectory};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<BookingCoordinator>,
    pub inventory: Arc<SeatInventory>,
    pub categorizer: Arc<BookingCategorizer>,
    pub directory: Arc<dyn TripDirectory>,
}

impl AppState {
    pub fn new(
        ledger: Arc<dyn SeatLedger>,
        directory: Arc<dyn TripDirectory>,
        clock: Arc<dyn Clock>,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            coordinator: Arc::new(BookingCoordinator::new(ledger, clock.clone(), policy)),
            inventory: Arc::new(SeatInventory::new(directory.clone())),
            categorizer: Arc::new(BookingCategorizer::new(directory.clone(), clock, policy)),
            directory,
        }
    }
}

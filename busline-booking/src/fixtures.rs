//! Seed data shared by unit and HTTP tests: bus `B1` with the standard 55
//! seat layout and schedule `S1` departing 2024-01-10 10:00.

use busline_core::ManualClock;
use busline_shared::{BusId, Departure, ScheduleId, SeatLayout};
use chrono::NaiveDateTime;
use std::sync::Arc;

use crate::memory::{BusRecord, MemoryStore, RouteRecord, ScheduleRecord, StaffRecord};

pub const B1: BusId = 1;
pub const S1: ScheduleId = 1;
pub const ROUTE: i64 = 10;
pub const DRIVER: i64 = 20;
pub const HELPER: i64 = 21;

/// Parses `"YYYY-MM-DD HH:MM"`.
pub fn local(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").expect("fixture timestamp")
}

pub fn departure(s: &str) -> Departure {
    let at = local(s);
    Departure::new(at.date(), at.time())
}

/// Clock reading `s` as UTC, which is also the default policy zone.
pub fn clock_at(s: &str) -> Arc<ManualClock> {
    Arc::new(ManualClock::new(local(s).and_utc()))
}

pub async fn add_schedule(store: &MemoryStore, schedule_id: ScheduleId, bus_id: BusId, departs: &str) {
    store
        .add_schedule(ScheduleRecord {
            schedule_id,
            bus_id,
            route_id: ROUTE,
            driver_id: Some(DRIVER),
            helper_id: Some(HELPER),
            departure: departure(departs),
        })
        .await;
}

pub async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();

    store
        .add_bus(
            BusRecord {
                bus_id: B1,
                bus_name: "Green Line".into(),
                bus_number: "DHA-11-2041".into(),
                bus_type: "AC".into(),
            },
            &SeatLayout::standard(),
        )
        .await;
    store
        .add_route(RouteRecord {
            route_id: ROUTE,
            source: "Campus".into(),
            destination: "Motijheel".into(),
            via: Some("Farmgate".into()),
        })
        .await;
    store
        .add_staff(StaffRecord {
            staff_id: DRIVER,
            name: "Rahim".into(),
            phone: Some("01700000001".into()),
            location: Some("https://maps.example/rahim".into()),
        })
        .await;
    store
        .add_staff(StaffRecord {
            staff_id: HELPER,
            name: "Karim".into(),
            phone: Some("01700000002".into()),
            location: None,
        })
        .await;
    add_schedule(&store, S1, B1, "2024-01-10 10:00").await;

    store
}

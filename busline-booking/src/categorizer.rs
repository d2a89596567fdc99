use busline_core::{BookingPolicy, Clock, CoreResult, TripDirectory};
use busline_shared::TripBooking;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategorizedBookings {
    pub upcoming: Vec<TripBooking>,
    pub history: Vec<TripBooking>,
}

/// Splits a user's bookings into upcoming trips and history.
pub struct BookingCategorizer {
    directory: Arc<dyn TripDirectory>,
    clock: Arc<dyn Clock>,
    policy: BookingPolicy,
}

impl BookingCategorizer {
    pub fn new(directory: Arc<dyn TripDirectory>, clock: Arc<dyn Clock>, policy: BookingPolicy) -> Self {
        Self { directory, clock, policy }
    }

    pub async fn for_user(&self, user_id: &str) -> CoreResult<CategorizedBookings> {
        let bookings = self.directory.bookings_for_user(user_id).await?;
        Ok(partition(bookings, self.clock.now(), &self.policy))
    }
}

/// A booking is upcoming while its departure is no more than the policy's
/// history window in the past. Departures that do not exist in the policy
/// zone (a skipped DST hour) are logged and left out of both lists.
pub fn partition(bookings: Vec<TripBooking>, now: DateTime<Utc>, policy: &BookingPolicy) -> CategorizedBookings {
    let threshold = now - policy.history_window;
    let mut out = CategorizedBookings::default();

    for booking in bookings {
        let Some(departs) = booking.departure().instant(&policy.tz) else {
            warn!(
                "Skipping booking {}: departure {} {} does not exist in {}",
                booking.booking_id,
                booking.date,
                booking.time,
                policy.tz.name()
            );
            continue;
        };

        if departs.with_timezone(&Utc) >= threshold {
            out.upcoming.push(booking);
        } else {
            out.history.push(booking);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, S1};
    use chrono::{Duration, NaiveDate, NaiveTime, TimeZone};
    use uuid::Uuid;

    fn booking_at(local: chrono::NaiveDateTime) -> TripBooking {
        TripBooking {
            booking_id: Uuid::new_v4(),
            user_id: "U1".into(),
            schedule_id: S1,
            r_number: "A".into(),
            column_number: 1,
            booking_time: Utc::now(),
            date: local.date(),
            time: local.time(),
            source: "Campus".into(),
            destination: "Motijheel".into(),
            via: None,
            bus_name: "Green Line".into(),
            bus_number: "DHA-11-2041".into(),
        }
    }

    #[test]
    fn test_history_window_boundary() {
        let policy = BookingPolicy::default();
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let local = now.naive_utc();

        let recent = booking_at(local - Duration::minutes(30));
        let edge = booking_at(local - Duration::minutes(60));
        let old = booking_at(local - Duration::minutes(90));
        let later = booking_at(local + Duration::days(1));

        let out = partition(vec![recent.clone(), edge.clone(), old.clone(), later.clone()], now, &policy);

        assert_eq!(out.upcoming, vec![recent, edge, later]);
        assert_eq!(out.history, vec![old]);
    }

    #[test]
    fn test_resolves_departure_in_policy_zone() {
        // 10:00 in Dhaka is 04:00 UTC, so at 05:30 UTC it left 90 minutes ago
        let policy = BookingPolicy::new(chrono_tz::Asia::Dhaka, 15, 60).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 5, 30, 0).unwrap();
        let trip = booking_at(fixtures::local("2024-01-10 10:00"));

        let out = partition(vec![trip], now, &policy);
        assert!(out.upcoming.is_empty());
        assert_eq!(out.history.len(), 1);
    }

    #[test]
    fn test_nonexistent_local_time_is_skipped() {
        let policy = BookingPolicy::new(chrono_tz::America::New_York, 15, 60).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 12, 0, 0, 0).unwrap();
        let gap = booking_at(
            NaiveDate::from_ymd_opt(2024, 3, 10)
                .unwrap()
                .and_time(NaiveTime::from_hms_opt(2, 30, 0).unwrap()),
        );
        let fine = booking_at(fixtures::local("2024-03-09 08:00"));

        let out = partition(vec![gap, fine.clone()], now, &policy);

        assert!(out.upcoming.is_empty());
        assert_eq!(out.history, vec![fine]);
    }

    #[tokio::test]
    async fn test_for_user_reads_directory() {
        let store = fixtures::seeded_store().await;
        fixtures::add_schedule(&store, 2, fixtures::B1, "2024-01-09 07:00").await;
        let clock = fixtures::clock_at("2024-01-09 06:00");
        let coordinator = crate::BookingCoordinator::new(Arc::new(store.clone()), clock.clone(), BookingPolicy::default());

        for (schedule_id, seat) in [(S1, "A1"), (2, "B1")] {
            coordinator
                .reserve(crate::ReserveRequest {
                    schedule_id,
                    user_id: "U1".into(),
                    seat: seat.parse().unwrap(),
                    previous_seat: None,
                })
                .await
                .unwrap();
        }

        clock.set(fixtures::local("2024-01-10 09:30").and_utc());
        let categorizer = BookingCategorizer::new(Arc::new(store), clock, BookingPolicy::default());
        let out = categorizer.for_user("U1").await.unwrap();

        assert_eq!(out.upcoming.len(), 1);
        assert_eq!(out.upcoming[0].schedule_id, S1);
        assert_eq!(out.history.len(), 1);
        assert_eq!(out.history[0].schedule_id, 2);

        assert_eq!(categorizer.for_user("nobody").await.unwrap(), CategorizedBookings::default());
    }
}

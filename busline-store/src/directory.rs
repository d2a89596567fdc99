use async_trait::async_trait;
use busline_core::{CoreError, CoreResult, TripDirectory};
use busline_shared::{
    BusId, Departure, ExpiredTrip, ScheduleId, Seat, SeatCoord, StaffContact, TripBooking,
    TripDetails,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

use crate::ledger::{parse_status, PgStore, ScheduleRow};

#[derive(sqlx::FromRow)]
struct TripRow {
    schedule_id: i64,
    bus_id: i64,
    bus_name: String,
    bus_number: String,
    bus_type: String,
    departure_date: NaiveDate,
    departure_time: NaiveTime,
    source: String,
    destination: String,
    via: Option<String>,
    driver_name: Option<String>,
    driver_phone: Option<String>,
    driver_location: Option<String>,
    helper_name: Option<String>,
    helper_phone: Option<String>,
    helper_location: Option<String>,
}

impl From<TripRow> for TripDetails {
    fn from(row: TripRow) -> Self {
        TripDetails {
            schedule_id: row.schedule_id,
            bus_id: row.bus_id,
            bus_name: row.bus_name,
            bus_number: row.bus_number,
            bus_type: row.bus_type,
            departure: Departure::new(row.departure_date, row.departure_time),
            source: row.source,
            destination: row.destination,
            via: row.via,
            driver: StaffContact {
                name: row.driver_name,
                phone: row.driver_phone,
                location: row.driver_location,
            },
            helper: StaffContact {
                name: row.helper_name,
                phone: row.helper_phone,
                location: row.helper_location,
            },
        }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    r_number: String,
    column_number: i32,
    status: String,
}

#[derive(sqlx::FromRow)]
struct TripBookingRow {
    booking_id: Uuid,
    user_id: String,
    schedule_id: i64,
    r_number: String,
    column_number: i32,
    booking_time: DateTime<Utc>,
    departure_date: NaiveDate,
    departure_time: NaiveTime,
    source: String,
    destination: String,
    via: Option<String>,
    bus_name: String,
    bus_number: String,
}

impl From<TripBookingRow> for TripBooking {
    fn from(row: TripBookingRow) -> Self {
        TripBooking {
            booking_id: row.booking_id,
            user_id: row.user_id,
            schedule_id: row.schedule_id,
            r_number: row.r_number,
            column_number: row.column_number,
            booking_time: row.booking_time,
            date: row.departure_date,
            time: row.departure_time,
            source: row.source,
            destination: row.destination,
            via: row.via,
            bus_name: row.bus_name,
            bus_number: row.bus_number,
        }
    }
}

fn storage(e: sqlx::Error) -> CoreError {
    CoreError::storage(e)
}

#[async_trait]
impl TripDirectory for PgStore {
    async fn trip_details(&self, schedule_id: ScheduleId) -> CoreResult<Option<TripDetails>> {
        let row = sqlx::query_as::<_, TripRow>(
            r#"
            SELECT s.schedule_id, b.bus_id, b.bus_name, b.bus_number, b.bus_type,
                   s.departure_date, s.departure_time,
                   r.source, r.destination, r.via,
                   d.name AS driver_name, d.phone AS driver_phone, d.location AS driver_location,
                   h.name AS helper_name, h.phone AS helper_phone, h.location AS helper_location
            FROM schedules s
            JOIN buses b ON b.bus_id = s.bus_id
            JOIN routes r ON r.route_id = s.route_id
            LEFT JOIN staff d ON d.staff_id = s.driver_id
            LEFT JOIN staff h ON h.staff_id = s.helper_id
            WHERE s.schedule_id = $1
            "#,
        )
        .bind(schedule_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(row.map(TripDetails::from))
    }

    async fn seats_for_bus(&self, bus_id: BusId) -> CoreResult<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(
            r#"
            SELECT r_number, column_number, status
            FROM seats
            WHERE bus_id = $1
            ORDER BY r_number, column_number
            "#,
        )
        .bind(bus_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter()
            .map(|row| {
                Ok(Seat {
                    status: parse_status(&row.status)?,
                    r_number: row.r_number,
                    column_number: row.column_number,
                })
            })
            .collect()
    }

    async fn booking_for(&self, user_id: &str, schedule_id: ScheduleId) -> CoreResult<Option<SeatCoord>> {
        let row: Option<(String, i32)> = sqlx::query_as(
            "SELECT r_number, column_number FROM bookings WHERE user_id = $1 AND schedule_id = $2 LIMIT 1",
        )
        .bind(user_id)
        .bind(schedule_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(row.map(|(r_number, column_number)| SeatCoord { r_number, column_number }))
    }

    async fn bookings_for_user(&self, user_id: &str) -> CoreResult<Vec<TripBooking>> {
        let rows = sqlx::query_as::<_, TripBookingRow>(
            r#"
            SELECT bk.booking_id, bk.user_id, bk.schedule_id, bk.r_number, bk.column_number, bk.booking_time,
                   s.departure_date, s.departure_time,
                   r.source, r.destination, r.via,
                   b.bus_name, b.bus_number
            FROM bookings bk
            JOIN schedules s ON s.schedule_id = bk.schedule_id
            JOIN routes r ON r.route_id = s.route_id
            JOIN buses b ON b.bus_id = s.bus_id
            WHERE bk.user_id = $1
            ORDER BY s.departure_date, s.departure_time, s.schedule_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows.into_iter().map(TripBooking::from).collect())
    }

    async fn expired_schedules(&self, cutoff: NaiveDateTime) -> CoreResult<Vec<ExpiredTrip>> {
        let rows = sqlx::query_as::<_, ScheduleRow>(
            r#"
            SELECT schedule_id, bus_id, departure_date, departure_time
            FROM schedules
            WHERE reaped_at IS NULL
              AND (departure_date + departure_time) < $1
            ORDER BY departure_date, departure_time
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows
            .into_iter()
            .map(|row| ExpiredTrip {
                schedule_id: row.schedule_id,
                bus_id: row.bus_id,
                departure: Departure::new(row.departure_date, row.departure_time),
            })
            .collect())
    }

    async fn ping(&self) -> CoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trip_row_keeps_missing_crew_empty() {
        let details = TripDetails::from(TripRow {
            schedule_id: 1,
            bus_id: 2,
            bus_name: "Green Line".into(),
            bus_number: "DHA-11-2041".into(),
            bus_type: "AC".into(),
            departure_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            departure_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            source: "Campus".into(),
            destination: "Motijheel".into(),
            via: None,
            driver_name: Some("Rahim".into()),
            driver_phone: None,
            driver_location: None,
            helper_name: None,
            helper_phone: None,
            helper_location: None,
        });

        assert_eq!(details.driver.name.as_deref(), Some("Rahim"));
        assert_eq!(details.helper, StaffContact::default());
        assert_eq!(details.bus_info().time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
    }
}

use async_trait::async_trait;
use busline_core::{CoreError, CoreResult, LedgerTx, SeatLedger};
use busline_shared::{
    BusId, Departure, HeldBooking, NewBooking, ScheduleId, ScheduleSlot, SeatCoord, SeatStatus,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::app_config::DatabaseConfig;

const BOOKING_SEAT_KEY: &str = "bookings_schedule_seat_key";

/// PostgreSQL implementation of the storage traits.
#[derive(Clone)]
pub struct PgStore {
    pub(crate) pool: PgPool,
    lock_timeout_ms: u64,
    statement_timeout_ms: u64,
}

impl PgStore {
    pub fn new(pool: PgPool, cfg: &DatabaseConfig) -> Self {
        Self {
            pool,
            lock_timeout_ms: cfg.lock_timeout_ms,
            statement_timeout_ms: cfg.statement_timeout_ms,
        }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
pub(crate) struct ScheduleRow {
    pub schedule_id: i64,
    pub bus_id: i64,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
}

impl From<ScheduleRow> for ScheduleSlot {
    fn from(row: ScheduleRow) -> Self {
        ScheduleSlot {
            schedule_id: row.schedule_id,
            bus_id: row.bus_id,
            departure: Departure::new(row.departure_date, row.departure_time),
        }
    }
}

#[derive(sqlx::FromRow)]
struct HeldRow {
    booking_id: Uuid,
    schedule_id: i64,
    r_number: String,
    column_number: i32,
}

impl From<HeldRow> for HeldBooking {
    fn from(row: HeldRow) -> Self {
        HeldBooking {
            booking_id: row.booking_id,
            schedule_id: row.schedule_id,
            seat: SeatCoord {
                r_number: row.r_number,
                column_number: row.column_number,
            },
        }
    }
}

pub(crate) fn parse_status(raw: &str) -> CoreResult<SeatStatus> {
    raw.parse().map_err(CoreError::storage)
}

fn storage(e: sqlx::Error) -> CoreError {
    CoreError::storage(e)
}

/// A duplicate on the booking seat key means a concurrent transaction got the
/// seat first.
fn seat_write(e: sqlx::Error, seat: &SeatCoord) -> CoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() && db.constraint() == Some(BOOKING_SEAT_KEY) {
            return CoreError::SeatUnavailable(seat.clone());
        }
    }
    CoreError::storage(e)
}

#[async_trait]
impl SeatLedger for PgStore {
    async fn begin(&self) -> CoreResult<Box<dyn LedgerTx>> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        // Bound lock waits so a stuck transaction fails instead of hanging
        sqlx::query("SELECT set_config('lock_timeout', $1, true), set_config('statement_timeout', $2, true)")
            .bind(format!("{}ms", self.lock_timeout_ms))
            .bind(format!("{}ms", self.statement_timeout_ms))
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        Ok(Box::new(PgLedgerTx { tx }))
    }
}

pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_user(&mut self, user_id: &str) -> CoreResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn schedule(&mut self, schedule_id: ScheduleId) -> CoreResult<Option<ScheduleSlot>> {
        let row = sqlx::query_as::<_, ScheduleRow>(
            r#"
            SELECT schedule_id, bus_id, departure_date, departure_time
            FROM schedules
            WHERE schedule_id = $1
            FOR SHARE
            "#,
        )
        .bind(schedule_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage)?;

        Ok(row.map(ScheduleSlot::from))
    }

    async fn bookings_at_time(&mut self, user_id: &str, time: NaiveTime) -> CoreResult<Vec<HeldBooking>> {
        let rows = sqlx::query_as::<_, HeldRow>(
            r#"
            SELECT b.booking_id, b.schedule_id, b.r_number, b.column_number
            FROM bookings b
            JOIN schedules s ON s.schedule_id = b.schedule_id
            WHERE b.user_id = $1 AND s.departure_time = $2
            FOR UPDATE OF b
            "#,
        )
        .bind(user_id)
        .bind(time)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage)?;

        Ok(rows.into_iter().map(HeldBooking::from).collect())
    }

    async fn find_booking(&mut self, user_id: &str, schedule_id: ScheduleId) -> CoreResult<Option<HeldBooking>> {
        let row = sqlx::query_as::<_, HeldRow>(
            r#"
            SELECT booking_id, schedule_id, r_number, column_number
            FROM bookings
            WHERE user_id = $1 AND schedule_id = $2
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(schedule_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage)?;

        Ok(row.map(HeldBooking::from))
    }

    async fn lock_seat(&mut self, bus_id: BusId, seat: &SeatCoord) -> CoreResult<Option<SeatStatus>> {
        let status: Option<String> = sqlx::query_scalar(
            r#"
            SELECT status
            FROM seats
            WHERE bus_id = $1 AND r_number = $2 AND column_number = $3
            FOR UPDATE
            "#,
        )
        .bind(bus_id)
        .bind(&seat.r_number)
        .bind(seat.column_number)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage)?;

        status.as_deref().map(parse_status).transpose()
    }

    async fn insert_booking(&mut self, booking: &NewBooking) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (booking_id, user_id, schedule_id, r_number, column_number, booking_time)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(booking.booking_id)
        .bind(&booking.user_id)
        .bind(booking.schedule_id)
        .bind(&booking.seat.r_number)
        .bind(booking.seat.column_number)
        .bind(booking.booked_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| seat_write(e, &booking.seat))?;

        Ok(())
    }

    async fn move_booking(&mut self, booking_id: Uuid, seat: &SeatCoord, booked_at: DateTime<Utc>) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET r_number = $2, column_number = $3, booking_time = $4
            WHERE booking_id = $1
            "#,
        )
        .bind(booking_id)
        .bind(&seat.r_number)
        .bind(seat.column_number)
        .bind(booked_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| seat_write(e, seat))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Booking {}", booking_id)));
        }
        Ok(())
    }

    async fn set_seat_status(&mut self, bus_id: BusId, seat: &SeatCoord, status: SeatStatus) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE seats
            SET status = $4
            WHERE bus_id = $1 AND r_number = $2 AND column_number = $3
            "#,
        )
        .bind(bus_id)
        .bind(&seat.r_number)
        .bind(seat.column_number)
        .bind(status.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Seat {} on bus {}", seat, bus_id)));
        }
        Ok(())
    }

    async fn lock_bus_seats(&mut self, bus_id: BusId) -> CoreResult<u64> {
        // Same row order as the booking path takes its seat locks
        let locked: Vec<i32> = sqlx::query_scalar(
            r#"
            SELECT column_number
            FROM seats
            WHERE bus_id = $1
            ORDER BY r_number, column_number
            FOR UPDATE
            "#,
        )
        .bind(bus_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage)?;

        debug!("Locked {} seat(s) of bus {}", locked.len(), bus_id);
        Ok(locked.len() as u64)
    }

    async fn release_stale_seats(&mut self, bus_id: BusId, cutoff: NaiveDateTime) -> CoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE seats st
            SET status = 'available'
            WHERE st.bus_id = $1
              AND st.status = 'unavailable'
              AND NOT EXISTS (
                  SELECT 1
                  FROM bookings b
                  JOIN schedules s ON s.schedule_id = b.schedule_id
                  WHERE s.bus_id = st.bus_id
                    AND b.r_number = st.r_number
                    AND b.column_number = st.column_number
                    AND (s.departure_date + s.departure_time) >= $2
              )
            "#,
        )
        .bind(bus_id)
        .bind(cutoff)
        .execute(&mut *self.tx)
        .await
        .map_err(storage)?;

        Ok(result.rows_affected())
    }

    async fn mark_reaped(&mut self, schedule_ids: &[ScheduleId], at: DateTime<Utc>) -> CoreResult<()> {
        sqlx::query("UPDATE schedules SET reaped_at = $2 WHERE schedule_id = ANY($1)")
            .bind(schedule_ids)
            .bind(at)
            .execute(&mut *self.tx)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        self.tx.commit().await.map_err(storage)
    }

    async fn rollback(self: Box<Self>) -> CoreResult<()> {
        self.tx.rollback().await.map_err(storage)
    }
}

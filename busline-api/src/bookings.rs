use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Json, Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Router,
};
use busline_booking::{CategorizedBookings, Reservation, ReserveRequest, SeatInventoryView};
use busline_shared::{ScheduleId, SeatCoord};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/seats/{schedule_id}", get(seat_map))
        .route("/book", post(book_seat))
        .route("/mybookings/{user_id}", get(my_bookings))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatQuery {
    pub user_id: Option<String>,
}

/// Body of `POST /book`. Every field is optional here so that a missing one
/// is reported as a validation failure rather than a deserialization error.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRequest {
    pub schedule_id: Option<ScheduleId>,
    pub user_id: Option<String>,
    pub r_number: Option<String>,
    pub column_number: Option<i32>,
    pub old_r_number: Option<String>,
    pub old_column_number: Option<i32>,
}

impl TryFrom<BookRequest> for ReserveRequest {
    type Error = AppError;

    fn try_from(req: BookRequest) -> Result<Self, Self::Error> {
        let (Some(schedule_id), Some(user_id), Some(r_number), Some(column_number)) =
            (req.schedule_id, req.user_id, req.r_number, req.column_number)
        else {
            return Err(AppError::ValidationError("Missing required fields".to_string()));
        };
        if user_id.trim().is_empty() || r_number.trim().is_empty() {
            return Err(AppError::ValidationError("Missing required fields".to_string()));
        }

        let previous_seat = match (req.old_r_number, req.old_column_number) {
            (Some(row), Some(column)) => Some(SeatCoord::new(&row, column)?),
            (None, None) => None,
            _ => {
                return Err(AppError::ValidationError(
                    "oldRNumber and oldColumnNumber must be given together".to_string(),
                ))
            }
        };

        Ok(ReserveRequest {
            schedule_id,
            user_id,
            seat: SeatCoord::new(&r_number, column_number)?,
            previous_seat,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub msg: String,
}

async fn seat_map(
    State(state): State<AppState>,
    schedule_id: Result<Path<ScheduleId>, PathRejection>,
    Query(query): Query<SeatQuery>,
) -> Result<Json<SeatInventoryView>, AppError> {
    let Path(schedule_id) = schedule_id?;
    let view = state.inventory.view(schedule_id, query.user_id.as_deref()).await?;
    Ok(Json(view))
}

async fn book_seat(
    State(state): State<AppState>,
    payload: Result<Json<BookRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let Json(payload) = payload?;
    let request = ReserveRequest::try_from(payload)?;

    info!("Reserve {} on schedule {} for user {}", request.seat, request.schedule_id, request.user_id);

    let msg = match state.coordinator.reserve(request).await? {
        Reservation::Created { .. } => "Seat booked successfully!",
        Reservation::Moved { .. } | Reservation::Unchanged { .. } => "Booking updated successfully!",
    };

    Ok((StatusCode::CREATED, Json(MessageResponse { msg: msg.to_string() })))
}

async fn my_bookings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<CategorizedBookings>, AppError> {
    let bookings = state.categorizer.for_user(&user_id).await?;
    Ok(Json(bookings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> BookRequest {
        BookRequest {
            schedule_id: Some(1),
            user_id: Some("U1".into()),
            r_number: Some("b".into()),
            column_number: Some(2),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_request_normalizes_seat() {
        let req = ReserveRequest::try_from(full()).unwrap();
        assert_eq!(req.seat.to_string(), "B2");
        assert!(req.previous_seat.is_none());
    }

    #[test]
    fn test_edit_request_needs_both_old_fields() {
        let req = ReserveRequest::try_from(BookRequest {
            old_r_number: Some("A".into()),
            old_column_number: Some(1),
            ..full()
        })
        .unwrap();
        assert_eq!(req.previous_seat.unwrap().to_string(), "A1");

        let half = ReserveRequest::try_from(BookRequest {
            old_r_number: Some("A".into()),
            ..full()
        });
        assert!(matches!(half, Err(AppError::ValidationError(_))));
    }

    #[test]
    fn test_missing_or_bad_fields_rejected() {
        for req in [
            BookRequest { schedule_id: None, ..full() },
            BookRequest { user_id: Some(" ".into()), ..full() },
            BookRequest { column_number: Some(0), ..full() },
            BookRequest { r_number: Some("AB".into()), ..full() },
        ] {
            assert!(matches!(ReserveRequest::try_from(req), Err(AppError::ValidationError(_))));
        }
    }
}

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use busline_core::CoreError;
use busline_shared::SeatParseError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    ValidationError(String),
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl AppError {
    /// Status, machine-readable kind and client message.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation", msg.clone()),
            AppError::Core(err) => match err {
                CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation", msg.clone()),
                CoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", err.to_string()),
                CoreError::TimeSlotTaken { .. } => (
                    StatusCode::CONFLICT,
                    "time_conflict",
                    "You already have a booking at this time.".to_string(),
                ),
                CoreError::TripDeparted(_) => (StatusCode::CONFLICT, "trip_departed", err.to_string()),
                CoreError::SeatUnavailable(_) => (
                    StatusCode::CONFLICT,
                    "seat_unavailable",
                    "Seat is already booked or unavailable".to_string(),
                ),
                CoreError::Storage(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal Server Error".to_string(),
                ),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, msg) = self.parts();

        if status.is_server_error() {
            tracing::error!("Internal Server Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", kind, msg);
        }

        let body = Json(json!({
            "msg": msg,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

impl From<SeatParseError> for AppError {
    fn from(err: SeatParseError) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::ValidationError(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::ValidationError(rejection.body_text())
    }
}

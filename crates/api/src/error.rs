//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga::{BookingError, CancellationError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Booking saga error.
    Booking(BookingError),
    /// Cancellation saga error.
    Cancellation(CancellationError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Booking(err) => booking_error_to_response(err),
            ApiError::Cancellation(err) => cancellation_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn booking_error_to_response(err: BookingError) -> (StatusCode, String) {
    match &err {
        BookingError::InvalidSchedule(_)
        | BookingError::InvalidAmount(_)
        | BookingError::PartyRoleMismatch { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        BookingError::PartyNotFound(_) | BookingError::PaymentRecordNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        BookingError::PaymentNotVerified { .. } | BookingError::AmountMismatch { .. } => {
            (StatusCode::PAYMENT_REQUIRED, err.to_string())
        }
        BookingError::PaymentVerificationFailed(_)
        | BookingError::PaymentInitiationFailed(_)
        | BookingError::CalendarCreateFailed(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
        BookingError::Domain(_) => (StatusCode::CONFLICT, err.to_string()),
        BookingError::SessionPersistFailed(_) | BookingError::Store(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

fn cancellation_error_to_response(err: CancellationError) -> (StatusCode, String) {
    match &err {
        CancellationError::SessionNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        CancellationError::AlreadyCancelled(_)
        | CancellationError::SessionCompleted(_)
        | CancellationError::CalendarNotConnected(_) => (StatusCode::CONFLICT, err.to_string()),
        CancellationError::NotSessionParticipant { .. } => {
            (StatusCode::FORBIDDEN, err.to_string())
        }
        CancellationError::CancellationWindowExpired { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        CancellationError::CalendarDeleteFailed(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
        CancellationError::Domain(_) => (StatusCode::CONFLICT, err.to_string()),
        CancellationError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        ApiError::Booking(err)
    }
}

impl From<CancellationError> for ApiError {
    fn from(err: CancellationError) -> Self {
        ApiError::Cancellation(err)
    }
}

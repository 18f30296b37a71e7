//! Session booking, cancellation, and read endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::{SessionId, TransactionId, UserId};
use domain::{CancelledBy, Session};
use gateway::{CalendarGateway, PaymentGateway};
use saga::{
    BookingOrchestrator, BookingRequest, CancellationOrchestrator, CancellationRequest,
    NotificationSink, RefundOutcome,
};
use serde::{Deserialize, Serialize};
use store::{PaymentStore, SessionStore, UserDirectory};

use crate::error::ApiError;

pub type DynUserDirectory = Arc<dyn UserDirectory>;
pub type DynSessionStore = Arc<dyn SessionStore>;
pub type DynPaymentStore = Arc<dyn PaymentStore>;
pub type DynCalendarGateway = Arc<dyn CalendarGateway>;
pub type DynPaymentGateway = Arc<dyn PaymentGateway>;
pub type DynNotificationSink = Arc<dyn NotificationSink>;

/// Shared application state accessible from all handlers.
///
/// Backends are held behind trait objects; the Arc blanket impls on the
/// store and gateway traits let the generic orchestrators run over them
/// unchanged.
pub struct AppState {
    pub booking: BookingOrchestrator<
        DynUserDirectory,
        DynSessionStore,
        DynPaymentStore,
        DynCalendarGateway,
        DynPaymentGateway,
        DynNotificationSink,
    >,
    pub cancellation: CancellationOrchestrator<
        DynSessionStore,
        DynPaymentStore,
        DynCalendarGateway,
        DynPaymentGateway,
        DynNotificationSink,
    >,
    pub sessions: DynSessionStore,
    pub payments: DynPaymentStore,
    pub payment_gateway: DynPaymentGateway,
}

// -- Request types --

#[derive(Deserialize)]
pub struct BookSessionRequest {
    pub therapist_id: UserId,
    pub client_id: UserId,
    pub scheduled_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub transaction_id: String,
}

#[derive(Deserialize)]
pub struct CancelSessionRequest {
    pub acting_user_id: UserId,
    /// Either `"client"` or `"therapist"`.
    pub cancelled_by: String,
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub therapist_id: String,
    pub client_id: String,
    pub scheduled_time: String,
    pub duration_minutes: u32,
    pub meeting_link: String,
    pub status: String,
    pub cancellation: Option<CancellationInfo>,
    pub shared_notes: Option<String>,
}

#[derive(Serialize)]
pub struct CancellationInfo {
    pub reason: String,
    pub cancelled_by: String,
    pub cancelled_at: String,
}

#[derive(Serialize)]
pub struct CancelSessionResponse {
    pub session: SessionResponse,
    /// `"refunded"`, `"not_required"`, or `"failed"`.
    pub refund_status: String,
    pub refund_id: Option<String>,
}

impl SessionResponse {
    fn from_session(session: &Session) -> Self {
        Self {
            id: session.id.to_string(),
            therapist_id: session.therapist_id.to_string(),
            client_id: session.client_id.to_string(),
            scheduled_time: session.scheduled_time.to_rfc3339(),
            duration_minutes: session.duration_minutes,
            meeting_link: session.meeting_link.clone(),
            status: session.status.to_string(),
            cancellation: session.cancellation.as_ref().map(|c| CancellationInfo {
                // Absent reasons are a data fact; the placeholder is
                // presentation only.
                reason: c
                    .reason
                    .clone()
                    .unwrap_or_else(|| "No reason provided".to_string()),
                cancelled_by: c.cancelled_by.to_string(),
                cancelled_at: c.cancelled_at.to_rfc3339(),
            }),
            shared_notes: session.shared_notes.clone(),
        }
    }
}

// -- Handlers --

/// POST /sessions — run the booking saga for a verified payment.
#[tracing::instrument(skip(state, req))]
pub async fn book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BookSessionRequest>,
) -> Result<(axum::http::StatusCode, Json<SessionResponse>), ApiError> {
    let session = state
        .booking
        .book_session(BookingRequest {
            therapist_id: req.therapist_id,
            client_id: req.client_id,
            scheduled_time: req.scheduled_time,
            duration_minutes: req.duration_minutes,
            transaction_id: TransactionId::new(req.transaction_id),
        })
        .await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(SessionResponse::from_session(&session)),
    ))
}

/// POST /sessions/:id/cancel — run the cancellation saga.
#[tracing::instrument(skip(state, req))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CancelSessionRequest>,
) -> Result<Json<CancelSessionResponse>, ApiError> {
    let session_id = parse_session_id(&id)?;
    let cancelled_by = CancelledBy::parse(&req.cancelled_by).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "Invalid cancelled_by '{}': expected 'client' or 'therapist'",
            req.cancelled_by
        ))
    })?;

    let outcome = state
        .cancellation
        .cancel_session(CancellationRequest {
            session_id,
            acting_user_id: req.acting_user_id,
            cancelled_by,
            reason: req.reason,
        })
        .await?;

    let (refund_status, refund_id) = match outcome.refund {
        RefundOutcome::Refunded { refund_id } => ("refunded", Some(refund_id)),
        RefundOutcome::NotRequired => ("not_required", None),
        RefundOutcome::Failed { .. } => ("failed", None),
    };

    Ok(Json(CancelSessionResponse {
        session: SessionResponse::from_session(&outcome.session),
        refund_status: refund_status.to_string(),
        refund_id,
    }))
}

/// GET /sessions/:id — load a session by ID.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session_id = parse_session_id(&id)?;
    let session = state
        .sessions
        .find_by_id(session_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("Session {id} not found")))?;

    Ok(Json(SessionResponse::from_session(&session)))
}

fn parse_session_id(id: &str) -> Result<SessionId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid session ID: {e}")))?;
    Ok(SessionId::from_uuid(uuid))
}

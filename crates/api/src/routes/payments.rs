//! Payment initiation and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{TransactionId, UserId};
use domain::Money;
use gateway::PaymentGateway;
use serde::{Deserialize, Serialize};
use store::PaymentStore;

use crate::error::ApiError;
use crate::routes::sessions::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct InitiatePaymentRequest {
    pub therapist_id: UserId,
    pub client_id: UserId,
    /// Session fee in major currency units.
    pub amount: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct InitiatePaymentResponse {
    pub transaction_id: String,
    pub payment_url: String,
}

#[derive(Serialize)]
pub struct PaymentStatusResponse {
    pub transaction_id: String,
    /// Ledger-side status: `pending`, `paid`, or `refunded`.
    pub status: String,
    pub amount: i64,
    /// Provider-side status as last reported; absent when the provider
    /// could not be reached.
    pub provider_status: Option<String>,
}

// -- Handlers --

/// POST /payments/initiate — start a payment and open a ledger record.
#[tracing::instrument(skip(state, req))]
pub async fn initiate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InitiatePaymentRequest>,
) -> Result<(axum::http::StatusCode, Json<InitiatePaymentResponse>), ApiError> {
    let initiated = state
        .booking
        .initiate_payment(req.therapist_id, req.client_id, Money::from_major(req.amount))
        .await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(InitiatePaymentResponse {
            transaction_id: initiated.transaction_id.to_string(),
            payment_url: initiated.payment_url,
        }),
    ))
}

/// GET /payments/:transaction_id/status — ledger status plus a
/// best-effort provider status check.
#[tracing::instrument(skip(state))]
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(transaction_id): Path<String>,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    let transaction_id = TransactionId::new(transaction_id);

    let record = state
        .payments
        .find_by_transaction(&transaction_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| {
            ApiError::NotFound(format!("No payment record for transaction {transaction_id}"))
        })?;

    let provider_status = match state.payment_gateway.check_status(&transaction_id).await {
        Ok(verification) => Some(verification.status.to_string()),
        Err(e) => {
            tracing::warn!(%transaction_id, error = %e, "provider status check failed");
            None
        }
    };

    Ok(Json(PaymentStatusResponse {
        transaction_id: transaction_id.to_string(),
        status: record.status.to_string(),
        amount: record.amount.major_units(),
        provider_status,
    }))
}

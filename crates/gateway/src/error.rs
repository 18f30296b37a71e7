use common::UserId;
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by the gateways, classified so callers never see
/// provider-specific shapes.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The therapist never connected a calendar.
    #[error("No calendar credential stored for therapist {0}")]
    CredentialMissing(UserId),

    /// Token refresh against the provider failed; calendar access for
    /// this therapist is lost until they reconnect. Not retryable.
    #[error("Calendar credential refresh failed for therapist {user_id}: {reason}")]
    CredentialRefreshFailed { user_id: UserId, reason: String },

    /// Provider event creation failed. Fatal to a booking attempt;
    /// retry policy belongs to the orchestrator's caller.
    #[error("Calendar event creation failed: {0}")]
    CalendarCreateFailed(String),

    /// Provider event deletion failed for a reason other than the event
    /// already being gone.
    #[error("Calendar event deletion failed: {0}")]
    CalendarDeleteFailed(String),

    #[error("Payment initiation failed: {0}")]
    PaymentInitiationFailed(String),

    #[error("Payment verification failed: {0}")]
    PaymentVerificationFailed(String),

    #[error("Payment refund failed: {0}")]
    PaymentRefundFailed(String),

    #[error("Payment status check failed: {0}")]
    PaymentStatusCheckFailed(String),

    /// Credential persistence failed mid-refresh.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

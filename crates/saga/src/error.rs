//! Orchestration error types.

use chrono::{DateTime, Utc};
use common::{SessionId, TransactionId, UserId};
use domain::{DomainError, Money, PartyRole};
use store::StoreError;
use thiserror::Error;

/// Errors that can abort a booking saga.
///
/// Any variant other than `SessionPersistFailed` and
/// `CalendarCreateFailed` means no side effects were left behind; those
/// two mean compensation ran (calendar cleanup, then refund) before the
/// error was surfaced.
#[derive(Debug, Error)]
pub enum BookingError {
    /// The requested schedule is not bookable.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// One of the parties does not exist.
    #[error("User not found: {0}")]
    PartyNotFound(UserId),

    /// A party exists but does not hold the role the booking needs.
    #[error("User {user_id} is not a {expected:?}")]
    PartyRoleMismatch { user_id: UserId, expected: PartyRole },

    /// The provider could not be asked about the payment.
    #[error("Payment verification failed: {0}")]
    PaymentVerificationFailed(String),

    /// The provider answered, but the payment is not completed.
    #[error("Payment {transaction_id} not verified: provider status is {status}")]
    PaymentNotVerified {
        transaction_id: TransactionId,
        status: String,
    },

    /// The provider reports a different amount than the ledger expects.
    #[error("Payment {transaction_id} amount mismatch: ledger has {expected}, provider saw {actual}")]
    AmountMismatch {
        transaction_id: TransactionId,
        expected: Money,
        actual: Money,
    },

    /// No ledger record exists for the transaction; the payment was never
    /// initiated through this platform.
    #[error("No payment record for transaction {0}")]
    PaymentRecordNotFound(TransactionId),

    /// Payment initiation with the provider failed.
    #[error("Payment initiation failed: {0}")]
    PaymentInitiationFailed(String),

    /// Non-positive amount at payment initiation.
    #[error("Invalid amount: {0}")]
    InvalidAmount(Money),

    /// Calendar event creation failed; the payment was refunded.
    #[error("Calendar event creation failed: {0}")]
    CalendarCreateFailed(String),

    /// The session could not be persisted; the calendar event was removed
    /// and the payment refunded.
    #[error("Session could not be persisted: {0}")]
    SessionPersistFailed(String),

    /// Domain invariant violation.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Storage error outside the persist step.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors that can abort a cancellation saga.
///
/// Precondition and calendar variants mean nothing changed; once the
/// session record is cancelled the saga no longer fails, refund trouble
/// is reported through the outcome instead.
#[derive(Debug, Error)]
pub enum CancellationError {
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Session {0} is already cancelled")]
    AlreadyCancelled(SessionId),

    #[error("Session {0} is already completed")]
    SessionCompleted(SessionId),

    /// The acting user is not the party they claim to cancel as.
    #[error("User {user_id} is not a participant of session {session_id}")]
    NotSessionParticipant {
        session_id: SessionId,
        user_id: UserId,
    },

    /// Client-initiated cancellation requested inside the protected
    /// window before the session start.
    #[error("Cancellation window for session {session_id} closed; it starts at {scheduled_time}")]
    CancellationWindowExpired {
        session_id: SessionId,
        scheduled_time: DateTime<Utc>,
    },

    /// The therapist has no stored calendar connection, so the provider
    /// event cannot be removed.
    #[error("Therapist {0} has no calendar connection")]
    CalendarNotConnected(UserId),

    /// Provider-side event deletion failed for a reason other than the
    /// event already being gone.
    #[error("Calendar event deletion failed: {0}")]
    CalendarDeleteFailed(String),

    /// Domain invariant violation.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Storage error before the refund leg.
    #[error(transparent)]
    Store(#[from] StoreError),
}

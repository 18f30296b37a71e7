use common::{SessionId, TransactionId};
use thiserror::Error;

use crate::payment::PaymentStatus;
use crate::session::SessionStatus;

/// Errors raised by domain state transitions.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A session lifecycle transition that the state machine forbids.
    #[error("Invalid session transition for {session_id}: {from} -> {to}")]
    InvalidSessionTransition {
        session_id: SessionId,
        from: SessionStatus,
        to: SessionStatus,
    },

    /// A payment lifecycle transition that the state machine forbids.
    #[error("Invalid payment transition for {transaction_id}: {from} -> {to}")]
    InvalidPaymentTransition {
        transaction_id: TransactionId,
        from: PaymentStatus,
        to: PaymentStatus,
    },
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;

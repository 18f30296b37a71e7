//! Payment ledger record and its lifecycle state machine.

use chrono::{DateTime, Utc};
use common::{PaymentId, TransactionId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::Money;

/// The state of a payment attempt.
///
/// State transitions:
/// ```text
/// Pending ──► Paid ──► Refunded
/// ```
///
/// `Paid` is only reached after independent verification against the
/// provider; `Refunded` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Payment initiated with the provider, not yet verified.
    #[default]
    Pending,

    /// Verified as completed against the provider.
    Paid,

    /// Refunded through the refund path (terminal state).
    Refunded,
}

impl PaymentStatus {
    /// Returns true if the payment can be marked paid in this state.
    pub fn can_mark_paid(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Paid)
    }

    /// Returns true if the payment can be refunded in this state.
    pub fn can_refund(&self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A row in the payment ledger.
///
/// Exists before any session does (payment is the first booking leg) and
/// is keyed by the provider transaction id; the session, once created,
/// references the payment only through that id. The two records share no
/// transactional boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub transaction_id: TransactionId,
    pub therapist_id: UserId,
    pub client_id: UserId,
    /// Amount in major currency units, always.
    pub amount: Money,
    pub status: PaymentStatus,
    /// Last-seen provider payload, retained for audit and diagnosis.
    pub provider_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Creates a pending record at initiation time.
    pub fn pending(
        transaction_id: TransactionId,
        therapist_id: UserId,
        client_id: UserId,
        amount: Money,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            transaction_id,
            therapist_id,
            client_id,
            amount,
            status: PaymentStatus::Pending,
            provider_response: None,
            created_at: Utc::now(),
        }
    }

    /// Marks the record paid, storing the verification payload.
    ///
    /// Marking an already-paid record paid again is a no-op update of the
    /// stored payload; a refunded record can never go back.
    pub fn mark_paid(&mut self, provider_response: serde_json::Value) -> Result<(), DomainError> {
        if !self.status.can_mark_paid() {
            return Err(DomainError::InvalidPaymentTransition {
                transaction_id: self.transaction_id.clone(),
                from: self.status,
                to: PaymentStatus::Paid,
            });
        }
        self.status = PaymentStatus::Paid;
        self.provider_response = Some(provider_response);
        Ok(())
    }

    /// Marks the record refunded, storing the refund payload.
    pub fn mark_refunded(
        &mut self,
        provider_response: serde_json::Value,
    ) -> Result<(), DomainError> {
        if !self.status.can_refund() {
            return Err(DomainError::InvalidPaymentTransition {
                transaction_id: self.transaction_id.clone(),
                from: self.status,
                to: PaymentStatus::Refunded,
            });
        }
        self.status = PaymentStatus::Refunded;
        self.provider_response = Some(provider_response);
        Ok(())
    }
}

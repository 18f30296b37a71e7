//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::TransactionId;
use domain::Money;
use serde_json::json;

use crate::error::GatewayError;

/// Customer details forwarded to the provider at initiation.
#[derive(Debug, Clone)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Request to start a payment with the provider.
#[derive(Debug, Clone)]
pub struct InitiatePayment {
    /// Amount in major units; converted to minor units inside the
    /// gateway implementation, never by callers.
    pub amount: Money,
    pub product_id: String,
    pub product_name: String,
    pub customer: CustomerInfo,
}

/// Result of a successful initiation.
#[derive(Debug, Clone)]
pub struct InitiatedPayment {
    pub transaction_id: TransactionId,
    /// Where to send the customer to complete the payment.
    pub payment_url: String,
}

/// Normalized provider-side payment status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyStatus {
    Completed,
    Pending,
    Other(String),
}

impl VerifyStatus {
    /// Returns true if the provider confirmed the payment completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, VerifyStatus::Completed)
    }

    /// Returns the status as a display string.
    pub fn as_str(&self) -> &str {
        match self {
            VerifyStatus::Completed => "Completed",
            VerifyStatus::Pending => "Pending",
            VerifyStatus::Other(s) => s,
        }
    }
}

impl std::fmt::Display for VerifyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalized verification result.
#[derive(Debug, Clone)]
pub struct Verification {
    pub status: VerifyStatus,
    /// Amount the provider saw, converted back to major units.
    pub amount: Money,
    /// Raw provider payload, retained for the ledger's audit trail.
    pub raw: serde_json::Value,
}

/// Result of a successful refund.
#[derive(Debug, Clone)]
pub struct RefundReceipt {
    pub refund_id: String,
    pub raw: serde_json::Value,
}

/// Trait for payment operations against the remote provider.
///
/// Verification is the only source of truth for "the client paid";
/// client-supplied success claims are never trusted. Refund idempotency
/// is the caller's job: check the ledger status before calling.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Starts a payment, returning the provider transaction id and the
    /// URL the customer completes it at.
    async fn initiate(&self, request: InitiatePayment)
    -> Result<InitiatedPayment, GatewayError>;

    /// Verifies a payment's status directly with the provider.
    async fn verify(&self, transaction_id: &TransactionId) -> Result<Verification, GatewayError>;

    /// Refunds a completed payment.
    async fn refund(
        &self,
        transaction_id: &TransactionId,
        amount: Money,
        remarks: &str,
    ) -> Result<RefundReceipt, GatewayError>;

    /// Polls current provider-side status; reconciliation only, not part
    /// of the core saga path.
    async fn check_status(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Verification, GatewayError>;
}

#[async_trait]
impl<T: PaymentGateway + ?Sized> PaymentGateway for Arc<T> {
    async fn initiate(
        &self,
        request: InitiatePayment,
    ) -> Result<InitiatedPayment, GatewayError> {
        (**self).initiate(request).await
    }

    async fn verify(&self, transaction_id: &TransactionId) -> Result<Verification, GatewayError> {
        (**self).verify(transaction_id).await
    }

    async fn refund(
        &self,
        transaction_id: &TransactionId,
        amount: Money,
        remarks: &str,
    ) -> Result<RefundReceipt, GatewayError> {
        (**self).refund(transaction_id, amount, remarks).await
    }

    async fn check_status(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Verification, GatewayError> {
        (**self).check_status(transaction_id).await
    }
}

#[derive(Debug)]
struct ProviderPayment {
    amount_minor: i64,
    status: VerifyStatus,
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    payments: HashMap<TransactionId, ProviderPayment>,
    next_id: u32,
    next_refund_id: u32,
    refund_calls: u32,
    fail_on_verify: bool,
    fail_on_refund: bool,
}

/// In-memory payment gateway for testing.
///
/// Holds provider-side payment state in minor units, like the real
/// provider would, so the major/minor conversion boundary is exercised.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a provider-side payment in the given status, returning its
    /// transaction id. Used to simulate the customer having gone through
    /// (or abandoned) the provider's payment page.
    pub fn seed_payment(&self, amount: Money, status: VerifyStatus) -> TransactionId {
        let mut state = self.state.write().unwrap();
        state.next_id += 1;
        let transaction_id = TransactionId::new(format!("PIDX-{:04}", state.next_id));
        state.payments.insert(
            transaction_id.clone(),
            ProviderPayment {
                amount_minor: amount.minor_units(),
                status,
            },
        );
        transaction_id
    }

    /// Marks an initiated payment as completed on the provider side,
    /// simulating the customer finishing the payment page.
    pub fn complete_payment(&self, transaction_id: &TransactionId) {
        if let Some(payment) = self
            .state
            .write()
            .unwrap()
            .payments
            .get_mut(transaction_id)
        {
            payment.status = VerifyStatus::Completed;
        }
    }

    /// Configures the gateway to fail verification calls.
    pub fn set_fail_on_verify(&self, fail: bool) {
        self.state.write().unwrap().fail_on_verify = fail;
    }

    /// Configures the gateway to fail refund calls.
    pub fn set_fail_on_refund(&self, fail: bool) {
        self.state.write().unwrap().fail_on_refund = fail;
    }

    /// Returns how many refund calls reached the provider.
    pub fn refund_calls(&self) -> u32 {
        self.state.read().unwrap().refund_calls
    }

    /// Returns the provider-side status of a payment, if known.
    pub fn provider_status(&self, transaction_id: &TransactionId) -> Option<VerifyStatus> {
        self.state
            .read()
            .unwrap()
            .payments
            .get(transaction_id)
            .map(|p| p.status.clone())
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn initiate(
        &self,
        request: InitiatePayment,
    ) -> Result<InitiatedPayment, GatewayError> {
        let mut state = self.state.write().unwrap();
        state.next_id += 1;
        let transaction_id = TransactionId::new(format!("PIDX-{:04}", state.next_id));
        state.payments.insert(
            transaction_id.clone(),
            ProviderPayment {
                amount_minor: request.amount.minor_units(),
                status: VerifyStatus::Pending,
            },
        );

        Ok(InitiatedPayment {
            payment_url: format!("https://pay.example.com/{}", transaction_id),
            transaction_id,
        })
    }

    async fn verify(&self, transaction_id: &TransactionId) -> Result<Verification, GatewayError> {
        let state = self.state.read().unwrap();
        if state.fail_on_verify {
            return Err(GatewayError::PaymentVerificationFailed(
                "provider unreachable".to_string(),
            ));
        }

        let payment = state.payments.get(transaction_id).ok_or_else(|| {
            GatewayError::PaymentVerificationFailed(format!(
                "unknown transaction {transaction_id}"
            ))
        })?;

        Ok(Verification {
            status: payment.status.clone(),
            amount: Money::from_minor(payment.amount_minor),
            raw: json!({
                "pidx": transaction_id.as_str(),
                "status": payment.status.as_str(),
                "total_amount": payment.amount_minor,
            }),
        })
    }

    async fn refund(
        &self,
        transaction_id: &TransactionId,
        amount: Money,
        remarks: &str,
    ) -> Result<RefundReceipt, GatewayError> {
        let mut state = self.state.write().unwrap();
        state.refund_calls += 1;

        if state.fail_on_refund {
            return Err(GatewayError::PaymentRefundFailed(
                "provider rejected refund".to_string(),
            ));
        }

        let payment = state.payments.get_mut(transaction_id).ok_or_else(|| {
            GatewayError::PaymentRefundFailed(format!("unknown transaction {transaction_id}"))
        })?;
        payment.status = VerifyStatus::Other("Refunded".to_string());

        state.next_refund_id += 1;
        let refund_id = format!("RF-{:04}", state.next_refund_id);
        Ok(RefundReceipt {
            raw: json!({
                "pidx": transaction_id.as_str(),
                "status": "Refunded",
                "refund_id": refund_id,
                "amount": amount.minor_units(),
                "remarks": remarks,
            }),
            refund_id,
        })
    }

    async fn check_status(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Verification, GatewayError> {
        self.verify(transaction_id).await.map_err(|e| match e {
            GatewayError::PaymentVerificationFailed(msg) => {
                GatewayError::PaymentStatusCheckFailed(msg)
            }
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request() -> InitiatePayment {
        InitiatePayment {
            amount: Money::from_major(1500),
            product_id: "session-60".to_string(),
            product_name: "60 minute session".to_string(),
            customer: CustomerInfo {
                name: "Asha Rai".to_string(),
                email: "asha@example.com".to_string(),
                phone: None,
            },
        }
    }

    #[tokio::test]
    async fn test_initiate_returns_pending_payment() {
        let gateway = InMemoryPaymentGateway::new();

        let initiated = gateway.initiate(make_request()).await.unwrap();
        assert!(initiated.transaction_id.as_str().starts_with("PIDX-"));
        assert!(initiated.payment_url.contains(initiated.transaction_id.as_str()));

        let verification = gateway.verify(&initiated.transaction_id).await.unwrap();
        assert_eq!(verification.status, VerifyStatus::Pending);
    }

    #[tokio::test]
    async fn test_verify_converts_back_to_major_units() {
        let gateway = InMemoryPaymentGateway::new();
        let tx = gateway.seed_payment(Money::from_major(1500), VerifyStatus::Completed);

        let verification = gateway.verify(&tx).await.unwrap();
        assert!(verification.status.is_completed());
        assert_eq!(verification.amount, Money::from_major(1500));
        assert_eq!(verification.raw["total_amount"], 150_000);
    }

    #[tokio::test]
    async fn test_verify_unknown_transaction() {
        let gateway = InMemoryPaymentGateway::new();
        let result = gateway.verify(&TransactionId::new("PIDX-NOPE")).await;
        assert!(matches!(
            result,
            Err(GatewayError::PaymentVerificationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_refund_counts_calls() {
        let gateway = InMemoryPaymentGateway::new();
        let tx = gateway.seed_payment(Money::from_major(1000), VerifyStatus::Completed);

        let receipt = gateway
            .refund(&tx, Money::from_major(1000), "Session cancelled")
            .await
            .unwrap();
        assert!(receipt.refund_id.starts_with("RF-"));
        assert_eq!(gateway.refund_calls(), 1);
        assert_eq!(
            gateway.provider_status(&tx),
            Some(VerifyStatus::Other("Refunded".to_string()))
        );
    }

    #[tokio::test]
    async fn test_fail_on_refund() {
        let gateway = InMemoryPaymentGateway::new();
        let tx = gateway.seed_payment(Money::from_major(1000), VerifyStatus::Completed);
        gateway.set_fail_on_refund(true);

        let result = gateway.refund(&tx, Money::from_major(1000), "x").await;
        assert!(matches!(result, Err(GatewayError::PaymentRefundFailed(_))));
    }

    #[tokio::test]
    async fn test_check_status_maps_error_kind() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_verify(true);

        let result = gateway.check_status(&TransactionId::new("PIDX-1")).await;
        assert!(matches!(
            result,
            Err(GatewayError::PaymentStatusCheckFailed(_))
        ));
    }
}

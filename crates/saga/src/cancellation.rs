//! Cancellation saga orchestrator.

use std::time::Duration;

use chrono::Utc;
use common::{SessionId, UserId};
use domain::{CancelledBy, Session};
use gateway::{CalendarGateway, GatewayError, PaymentGateway};
use store::{PaymentStore, SessionStore};

use crate::booking::DEFAULT_CALL_TIMEOUT;
use crate::error::CancellationError;
use crate::notify::NotificationSink;
use crate::state::SagaState;

/// Everything a cancellation attempt carries in.
#[derive(Debug, Clone)]
pub struct CancellationRequest {
    pub session_id: SessionId,
    /// Who is asking; must match the party named by `cancelled_by`.
    pub acting_user_id: UserId,
    pub cancelled_by: CancelledBy,
    pub reason: Option<String>,
}

/// How the refund leg of a cancellation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundOutcome {
    /// The payment was refunded and the ledger updated.
    Refunded { refund_id: String },

    /// No refundable payment existed for the session.
    NotRequired,

    /// The session is cancelled but the refund could not be issued; the
    /// ledger record stays paid for manual reconciliation.
    Failed { reason: String },
}

impl RefundOutcome {
    /// Returns true if money went back to the client.
    pub fn is_refunded(&self) -> bool {
        matches!(self, RefundOutcome::Refunded { .. })
    }
}

/// Result of a completed cancellation saga.
///
/// Cancellation never rolls back: once the session record is cancelled
/// the saga reports partial success through `refund` instead of failing.
#[derive(Debug, Clone)]
pub struct CancellationOutcome {
    pub session: Session,
    pub refund: RefundOutcome,
}

/// Orchestrates the cancellation saga.
///
/// Preconditions are checked in a fixed order (existence, state,
/// participation, window, calendar connection) so callers get the most
/// specific error first. Calendar deletion is fail-fast; everything
/// after the session record flips to cancelled is best effort.
pub struct CancellationOrchestrator<S, P, Cal, Pay, N>
where
    S: SessionStore,
    P: PaymentStore,
    Cal: CalendarGateway,
    Pay: PaymentGateway,
    N: NotificationSink,
{
    sessions: S,
    payments: P,
    calendar: Cal,
    payment_gateway: Pay,
    notifier: N,
    call_timeout: Duration,
}

impl<S, P, Cal, Pay, N> CancellationOrchestrator<S, P, Cal, Pay, N>
where
    S: SessionStore,
    P: PaymentStore,
    Cal: CalendarGateway,
    Pay: PaymentGateway,
    N: NotificationSink,
{
    /// Creates a new cancellation orchestrator with the default call timeout.
    pub fn new(sessions: S, payments: P, calendar: Cal, payment_gateway: Pay, notifier: N) -> Self {
        Self {
            sessions,
            payments,
            calendar,
            payment_gateway,
            notifier,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Overrides the per-call provider timeout.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Executes the cancellation saga for the given request.
    #[tracing::instrument(
        skip(self, request),
        fields(session_id = %request.session_id, cancelled_by = %request.cancelled_by)
    )]
    pub async fn cancel_session(
        &self,
        request: CancellationRequest,
    ) -> Result<CancellationOutcome, CancellationError> {
        metrics::counter!("cancellation_saga_total").increment(1);
        let saga_start = std::time::Instant::now();
        let mut state = SagaState::Running;

        // 1. Load the session and check its state
        let mut session = self
            .sessions
            .find_by_id(request.session_id)
            .await?
            .ok_or(CancellationError::SessionNotFound(request.session_id))?;

        if !session.status.can_cancel() {
            metrics::counter!("cancellation_saga_failed").increment(1);
            return Err(match session.status {
                domain::SessionStatus::Cancelled => {
                    CancellationError::AlreadyCancelled(session.id)
                }
                _ => CancellationError::SessionCompleted(session.id),
            });
        }

        // 2. The acting user must be the party they cancel as
        let expected_actor = match request.cancelled_by {
            CancelledBy::Client => session.client_id,
            CancelledBy::Therapist => session.therapist_id,
        };
        if request.acting_user_id != expected_actor {
            metrics::counter!("cancellation_saga_failed").increment(1);
            return Err(CancellationError::NotSessionParticipant {
                session_id: session.id,
                user_id: request.acting_user_id,
            });
        }

        // 3. Clients are bound by the cancellation window; therapists are not
        let now = Utc::now();
        if request.cancelled_by == CancelledBy::Client && !session.client_cancellation_open(now) {
            metrics::counter!("cancellation_saga_failed").increment(1);
            return Err(CancellationError::CancellationWindowExpired {
                session_id: session.id,
                scheduled_time: session.scheduled_time,
            });
        }

        // 4. Remove the calendar event, fail-fast
        if let Some(provider_event_id) = session.calendar_event_id.clone() {
            let has_credential = self
                .calendar
                .has_credential(session.therapist_id)
                .await
                .map_err(|e| CancellationError::CalendarDeleteFailed(e.to_string()))?;
            if !has_credential {
                metrics::counter!("cancellation_saga_failed").increment(1);
                return Err(CancellationError::CalendarNotConnected(session.therapist_id));
            }

            tracing::info!(state = %state, step = "delete_calendar_event", "saga step started");
            let delete_result = match tokio::time::timeout(
                self.call_timeout,
                self.calendar
                    .delete_event(session.therapist_id, &provider_event_id),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(GatewayError::CalendarDeleteFailed(format!(
                    "timed out after {:?}",
                    self.call_timeout
                ))),
            };
            if let Err(e) = delete_result {
                metrics::counter!("cancellation_saga_failed").increment(1);
                return Err(CancellationError::CalendarDeleteFailed(e.to_string()));
            }
        }

        // 5. Flip the session record; after this the saga cannot fail
        session.cancel(request.reason, request.cancelled_by, now)?;
        if self.sessions.update(&session).await?.is_none() {
            // Deleted out from under us between load and update.
            metrics::counter!("cancellation_saga_failed").increment(1);
            return Err(CancellationError::SessionNotFound(session.id));
        }

        // 6. Refund leg, best effort
        tracing::info!(state = %state, step = "refund_payment", "saga step started");
        let refund = self.refund_if_paid(&session).await;
        if let RefundOutcome::Failed { reason } = &refund {
            metrics::counter!("cancellation_refund_failures").increment(1);
            tracing::warn!(state = %state, reason, "refund leg failed; reporting partial success");
        }

        state = SagaState::Completed;
        self.notifier.session_cancelled(&session).await;

        let duration = saga_start.elapsed().as_secs_f64();
        metrics::histogram!("cancellation_saga_duration_seconds").record(duration);
        metrics::counter!("cancellation_saga_completed").increment(1);
        tracing::info!(
            state = %state,
            session_id = %session.id,
            refunded = refund.is_refunded(),
            duration,
            "cancellation saga completed"
        );

        Ok(CancellationOutcome { session, refund })
    }

    /// Refunds the session's payment if the ledger holds a paid record.
    ///
    /// A missing or unpaid record means no money moved, so there is
    /// nothing to give back.
    async fn refund_if_paid(&self, session: &Session) -> RefundOutcome {
        let Some(transaction_id) = session.transaction_id.clone() else {
            return RefundOutcome::NotRequired;
        };

        let mut record = match self.payments.find_by_transaction(&transaction_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return RefundOutcome::NotRequired,
            Err(e) => {
                tracing::error!(
                    %transaction_id,
                    error = %e,
                    "ledger lookup failed during refund; reconcile manually"
                );
                return RefundOutcome::Failed { reason: e.to_string() };
            }
        };
        if !record.status.can_refund() {
            return RefundOutcome::NotRequired;
        }

        let remarks = session
            .cancellation
            .as_ref()
            .and_then(|c| c.reason.clone())
            .unwrap_or_else(|| "Session cancelled".to_string());

        let refund_result = match tokio::time::timeout(
            self.call_timeout,
            self.payment_gateway
                .refund(&transaction_id, record.amount, &remarks),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GatewayError::PaymentRefundFailed(format!(
                "timed out after {:?}",
                self.call_timeout
            ))),
        };
        let receipt = match refund_result {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::error!(
                    %transaction_id,
                    error = %e,
                    "refund failed; session stays cancelled, record stays paid"
                );
                return RefundOutcome::Failed { reason: e.to_string() };
            }
        };

        if let Err(e) = record.mark_refunded(receipt.raw) {
            tracing::error!(%transaction_id, error = %e, "refund issued but ledger transition rejected");
            return RefundOutcome::Failed { reason: e.to_string() };
        }
        if let Err(e) = self.payments.update(&record).await {
            tracing::error!(%transaction_id, error = %e, "refund issued but ledger update failed");
            return RefundOutcome::Failed { reason: e.to_string() };
        }

        tracing::info!(%transaction_id, refund_id = %receipt.refund_id, "payment refunded");
        RefundOutcome::Refunded {
            refund_id: receipt.refund_id,
        }
    }
}

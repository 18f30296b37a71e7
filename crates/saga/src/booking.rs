//! Booking saga orchestrator.

use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{SessionId, TransactionId, UserId};
use domain::{Money, Party, PartyRole, PaymentRecord, Session};
use gateway::{
    CalendarGateway, CustomerInfo, EventDetails, GatewayError, InitiatePayment, InitiatedPayment,
    PaymentGateway,
};
use store::{PaymentStore, SessionStore, UserDirectory};

use crate::error::BookingError;
use crate::notify::NotificationSink;
use crate::state::SagaState;

/// Upper bound on any single provider call made by the orchestrators.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a booking attempt carries in.
///
/// The transaction id names a payment the client claims to have made;
/// the orchestrator never trusts that claim and verifies it with the
/// provider before anything else changes.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub therapist_id: UserId,
    pub client_id: UserId,
    pub scheduled_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub transaction_id: TransactionId,
}

/// Orchestrates the booking saga.
///
/// The saga runs verify payment → mark paid → create calendar event →
/// persist session. On failure after the payment leg, compensation runs
/// in reverse order of side effects: calendar cleanup first, refund
/// second, each wrapped so one compensation failing never blocks the
/// next.
pub struct BookingOrchestrator<U, S, P, Cal, Pay, N>
where
    U: UserDirectory,
    S: SessionStore,
    P: PaymentStore,
    Cal: CalendarGateway,
    Pay: PaymentGateway,
    N: NotificationSink,
{
    users: U,
    sessions: S,
    payments: P,
    calendar: Cal,
    payment_gateway: Pay,
    notifier: N,
    call_timeout: Duration,
}

impl<U, S, P, Cal, Pay, N> BookingOrchestrator<U, S, P, Cal, Pay, N>
where
    U: UserDirectory,
    S: SessionStore,
    P: PaymentStore,
    Cal: CalendarGateway,
    Pay: PaymentGateway,
    N: NotificationSink,
{
    /// Creates a new booking orchestrator with the default call timeout.
    pub fn new(
        users: U,
        sessions: S,
        payments: P,
        calendar: Cal,
        payment_gateway: Pay,
        notifier: N,
    ) -> Self {
        Self {
            users,
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

    /// Initiates a payment with the provider and opens a pending ledger
    /// record keyed by the returned transaction id.
    #[tracing::instrument(skip(self), fields(%therapist_id, %client_id, %amount))]
    pub async fn initiate_payment(
        &self,
        therapist_id: UserId,
        client_id: UserId,
        amount: Money,
    ) -> Result<InitiatedPayment, BookingError> {
        if !amount.is_positive() {
            return Err(BookingError::InvalidAmount(amount));
        }

        let therapist = self.resolve_party(therapist_id, PartyRole::Therapist).await?;
        let client = self.resolve_party(client_id, PartyRole::Client).await?;

        let request = InitiatePayment {
            amount,
            product_id: format!("session-{}", therapist.id),
            product_name: format!("Therapy session with {}", therapist.fullname),
            customer: CustomerInfo {
                name: client.fullname.clone(),
                email: client.email.clone(),
                phone: None,
            },
        };

        let initiated = match tokio::time::timeout(
            self.call_timeout,
            self.payment_gateway.initiate(request),
        )
        .await
        {
            Ok(Ok(initiated)) => initiated,
            Ok(Err(e)) => return Err(BookingError::PaymentInitiationFailed(e.to_string())),
            Err(_) => {
                return Err(BookingError::PaymentInitiationFailed(format!(
                    "timed out after {:?}",
                    self.call_timeout
                )));
            }
        };

        let record =
            PaymentRecord::pending(initiated.transaction_id.clone(), therapist_id, client_id, amount);
        self.payments.insert(&record).await?;

        tracing::info!(transaction_id = %initiated.transaction_id, "payment initiated");
        Ok(initiated)
    }

    /// Executes the booking saga for the given request.
    ///
    /// Returns the persisted session on success. On failure the platform
    /// is left with no session, no calendar event, and the payment either
    /// untouched (pre-payment failures) or refunded (post-payment
    /// failures, refund permitting).
    #[tracing::instrument(
        skip(self, request),
        fields(transaction_id = %request.transaction_id, therapist_id = %request.therapist_id)
    )]
    pub async fn book_session(&self, request: BookingRequest) -> Result<Session, BookingError> {
        metrics::counter!("booking_saga_total").increment(1);
        let saga_start = std::time::Instant::now();
        let mut state = SagaState::Running;

        // 1. Validate the schedule
        let now = Utc::now();
        if request.scheduled_time <= now {
            return Err(BookingError::InvalidSchedule(
                "scheduled time is in the past".to_string(),
            ));
        }
        if request.duration_minutes == 0 {
            return Err(BookingError::InvalidSchedule(
                "duration must be positive".to_string(),
            ));
        }

        // 2. Resolve both parties
        let therapist = self
            .resolve_party(request.therapist_id, PartyRole::Therapist)
            .await?;
        let client = self.resolve_party(request.client_id, PartyRole::Client).await?;

        // 3. Verify the payment with the provider
        tracing::info!(state = %state, step = "verify_payment", "saga step started");
        let verify_result = match tokio::time::timeout(
            self.call_timeout,
            self.payment_gateway.verify(&request.transaction_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GatewayError::PaymentVerificationFailed(format!(
                "timed out after {:?}",
                self.call_timeout
            ))),
        };
        let verification = match verify_result {
            Ok(verification) => verification,
            Err(e) => {
                metrics::counter!("booking_saga_failed").increment(1);
                return Err(BookingError::PaymentVerificationFailed(e.to_string()));
            }
        };
        if !verification.status.is_completed() {
            metrics::counter!("booking_saga_failed").increment(1);
            return Err(BookingError::PaymentNotVerified {
                transaction_id: request.transaction_id,
                status: verification.status.to_string(),
            });
        }

        // 4. Mark the ledger record paid
        let mut record = self
            .payments
            .find_by_transaction(&request.transaction_id)
            .await?
            .ok_or_else(|| BookingError::PaymentRecordNotFound(request.transaction_id.clone()))?;
        if verification.amount != record.amount {
            metrics::counter!("booking_saga_failed").increment(1);
            return Err(BookingError::AmountMismatch {
                transaction_id: request.transaction_id,
                expected: record.amount,
                actual: verification.amount,
            });
        }
        record.mark_paid(verification.raw)?;
        self.payments.update(&record).await?;

        // 5. Create the calendar event
        tracing::info!(state = %state, step = "create_calendar_event", "saga step started");
        let details = EventDetails {
            title: format!("Therapy session: {} with {}", therapist.fullname, client.fullname),
            description: format!("Booked via transaction {}", request.transaction_id),
            start: request.scheduled_time,
            end: request.scheduled_time
                + chrono::Duration::minutes(i64::from(request.duration_minutes)),
            attendees: vec![therapist.email.clone(), client.email.clone()],
        };
        let create_result = match tokio::time::timeout(
            self.call_timeout,
            self.calendar.create_event(request.therapist_id, details),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GatewayError::CalendarCreateFailed(format!(
                "timed out after {:?}",
                self.call_timeout
            ))),
        };
        let created = match create_result {
            Ok(created) => created,
            Err(e) => {
                state = SagaState::Compensating;
                tracing::warn!(state = %state, error = %e, "calendar event creation failed");
                self.refund_payment(&mut record, "Booking failed: calendar event creation")
                    .await;
                state = SagaState::Failed;
                metrics::counter!("booking_saga_failed").increment(1);
                metrics::histogram!("booking_saga_duration_seconds")
                    .record(saga_start.elapsed().as_secs_f64());
                tracing::warn!(state = %state, "booking saga failed");
                return Err(BookingError::CalendarCreateFailed(e.to_string()));
            }
        };

        // 6. Persist the session
        let session = Session::scheduled(
            SessionId::new(),
            request.therapist_id,
            request.client_id,
            request.scheduled_time,
            request.duration_minutes,
            created.join_link.clone(),
            created.provider_event_id.clone(),
            request.transaction_id.clone(),
        );
        if let Err(e) = self.sessions.insert(&session).await {
            state = SagaState::Compensating;
            tracing::warn!(state = %state, error = %e, "session persistence failed");
            // Calendar cleanup runs before the refund; each leg is
            // wrapped so one failing never blocks the other.
            self.remove_calendar_event(request.therapist_id, &created.provider_event_id)
                .await;
            self.refund_payment(&mut record, "Booking failed: session persistence")
                .await;
            state = SagaState::Failed;
            metrics::counter!("booking_saga_failed").increment(1);
            metrics::histogram!("booking_saga_duration_seconds")
                .record(saga_start.elapsed().as_secs_f64());
            tracing::warn!(state = %state, "booking saga failed");
            return Err(BookingError::SessionPersistFailed(e.to_string()));
        }

        // 7. Saga completed
        state = SagaState::Completed;
        self.notifier.session_booked(&session).await;

        let duration = saga_start.elapsed().as_secs_f64();
        metrics::histogram!("booking_saga_duration_seconds").record(duration);
        metrics::counter!("booking_saga_completed").increment(1);
        tracing::info!(state = %state, session_id = %session.id, duration, "booking saga completed");

        Ok(session)
    }

    /// Loads a party and checks it holds the expected role.
    async fn resolve_party(
        &self,
        user_id: UserId,
        expected: PartyRole,
    ) -> Result<Party, BookingError> {
        let party = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(BookingError::PartyNotFound(user_id))?;
        if party.role != expected {
            return Err(BookingError::PartyRoleMismatch { user_id, expected });
        }
        Ok(party)
    }

    /// Compensation: removes a provider event, best effort.
    async fn remove_calendar_event(&self, therapist_id: UserId, provider_event_id: &str) {
        let delete_result = match tokio::time::timeout(
            self.call_timeout,
            self.calendar.delete_event(therapist_id, provider_event_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GatewayError::CalendarDeleteFailed(format!(
                "timed out after {:?}",
                self.call_timeout
            ))),
        };
        match delete_result {
            Ok(()) => {
                tracing::info!(provider_event_id, "compensating calendar cleanup done");
            }
            Err(e) => {
                tracing::error!(
                    provider_event_id,
                    error = %e,
                    "compensating calendar cleanup failed; orphaned provider event"
                );
            }
        }
    }

    /// Compensation: refunds a paid ledger record, best effort.
    ///
    /// If the refund cannot be issued the record stays `paid` and the
    /// failure is logged for manual reconciliation.
    async fn refund_payment(&self, record: &mut PaymentRecord, remarks: &str) {
        let refund_result = match tokio::time::timeout(
            self.call_timeout,
            self.payment_gateway
                .refund(&record.transaction_id, record.amount, remarks),
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
                metrics::counter!("compensation_refund_failures").increment(1);
                tracing::error!(
                    transaction_id = %record.transaction_id,
                    error = %e,
                    "compensating refund failed; record stays paid for manual reconciliation"
                );
                return;
            }
        };

        if let Err(e) = record.mark_refunded(receipt.raw) {
            tracing::error!(
                transaction_id = %record.transaction_id,
                error = %e,
                "refund issued but ledger transition rejected; reconcile manually"
            );
            return;
        }
        match self.payments.update(record).await {
            Ok(_) => {
                tracing::info!(
                    transaction_id = %record.transaction_id,
                    refund_id = %receipt.refund_id,
                    "compensating refund issued"
                );
            }
            Err(e) => {
                tracing::error!(
                    transaction_id = %record.transaction_id,
                    error = %e,
                    "refund issued but ledger update failed; reconcile manually"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use domain::PaymentStatus;
    use gateway::{InMemoryCalendarGateway, InMemoryPaymentGateway, VerifyStatus};
    use store::{InMemoryPaymentStore, InMemorySessionStore, InMemoryUserDirectory};

    struct Fixture {
        orchestrator: BookingOrchestrator<
            InMemoryUserDirectory,
            InMemorySessionStore,
            InMemoryPaymentStore,
            InMemoryCalendarGateway,
            InMemoryPaymentGateway,
            RecordingNotifier,
        >,
        sessions: InMemorySessionStore,
        payments: InMemoryPaymentStore,
        calendar: InMemoryCalendarGateway,
        payment_gateway: InMemoryPaymentGateway,
        notifier: RecordingNotifier,
        therapist_id: UserId,
        client_id: UserId,
    }

    async fn setup() -> Fixture {
        let users = InMemoryUserDirectory::new();
        let therapist_id = users
            .add(Party::new(
                UserId::new(),
                "Dr. Nischal Shrestha",
                "nischal@example.com",
                PartyRole::Therapist,
            ))
            .await;
        let client_id = users
            .add(Party::new(
                UserId::new(),
                "Asha Rai",
                "asha@example.com",
                PartyRole::Client,
            ))
            .await;

        let sessions = InMemorySessionStore::new();
        let payments = InMemoryPaymentStore::new();
        let calendar = InMemoryCalendarGateway::new();
        let payment_gateway = InMemoryPaymentGateway::new();
        let notifier = RecordingNotifier::new();

        let orchestrator = BookingOrchestrator::new(
            users,
            sessions.clone(),
            payments.clone(),
            calendar.clone(),
            payment_gateway.clone(),
            notifier.clone(),
        );

        Fixture {
            orchestrator,
            sessions,
            payments,
            calendar,
            payment_gateway,
            notifier,
            therapist_id,
            client_id,
        }
    }

    /// Seeds a completed provider payment plus its pending ledger record.
    async fn seed_paid(fixture: &Fixture, amount: Money) -> TransactionId {
        let tx = fixture
            .payment_gateway
            .seed_payment(amount, VerifyStatus::Completed);
        fixture
            .payments
            .insert(&PaymentRecord::pending(
                tx.clone(),
                fixture.therapist_id,
                fixture.client_id,
                amount,
            ))
            .await
            .unwrap();
        tx
    }

    fn make_request(fixture: &Fixture, tx: TransactionId) -> BookingRequest {
        BookingRequest {
            therapist_id: fixture.therapist_id,
            client_id: fixture.client_id,
            scheduled_time: Utc::now() + chrono::Duration::days(3),
            duration_minutes: 60,
            transaction_id: tx,
        }
    }

    #[tokio::test]
    async fn test_happy_path() {
        let fixture = setup().await;
        let tx = seed_paid(&fixture, Money::from_major(1500)).await;

        let session = fixture
            .orchestrator
            .book_session(make_request(&fixture, tx.clone()))
            .await
            .unwrap();

        assert_eq!(session.therapist_id, fixture.therapist_id);
        assert_eq!(session.transaction_id, Some(tx.clone()));
        assert!(session.calendar_event_id.is_some());
        assert!(session.meeting_link.starts_with("https://"));

        // Persisted, calendared, marked paid, notified.
        let stored = fixture.sessions.find_by_id(session.id).await.unwrap();
        assert_eq!(stored, Some(session.clone()));
        assert_eq!(fixture.calendar.event_count(), 1);
        let record = fixture.payments.find_by_transaction(&tx).await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Paid);
        assert_eq!(fixture.notifier.booked(), vec![session.id]);
    }

    #[tokio::test]
    async fn test_rejects_past_schedule() {
        let fixture = setup().await;
        let tx = seed_paid(&fixture, Money::from_major(1500)).await;

        let mut request = make_request(&fixture, tx);
        request.scheduled_time = Utc::now() - chrono::Duration::hours(1);

        let result = fixture.orchestrator.book_session(request).await;
        assert!(matches!(result, Err(BookingError::InvalidSchedule(_))));
        assert_eq!(fixture.sessions.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_rejects_zero_duration() {
        let fixture = setup().await;
        let tx = seed_paid(&fixture, Money::from_major(1500)).await;

        let mut request = make_request(&fixture, tx);
        request.duration_minutes = 0;

        let result = fixture.orchestrator.book_session(request).await;
        assert!(matches!(result, Err(BookingError::InvalidSchedule(_))));
    }

    #[tokio::test]
    async fn test_unknown_party() {
        let fixture = setup().await;
        let tx = seed_paid(&fixture, Money::from_major(1500)).await;

        let mut request = make_request(&fixture, tx);
        request.client_id = UserId::new();

        let result = fixture.orchestrator.book_session(request).await;
        assert!(matches!(result, Err(BookingError::PartyNotFound(_))));
    }

    #[tokio::test]
    async fn test_party_role_mismatch() {
        let fixture = setup().await;
        let tx = seed_paid(&fixture, Money::from_major(1500)).await;

        // A client cannot stand in for the therapist.
        let mut request = make_request(&fixture, tx);
        request.therapist_id = fixture.client_id;

        let result = fixture.orchestrator.book_session(request).await;
        assert!(matches!(
            result,
            Err(BookingError::PartyRoleMismatch {
                expected: PartyRole::Therapist,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_pending_payment_is_not_verified() {
        let fixture = setup().await;
        let tx = fixture
            .payment_gateway
            .seed_payment(Money::from_major(1500), VerifyStatus::Pending);
        fixture
            .payments
            .insert(&PaymentRecord::pending(
                tx.clone(),
                fixture.therapist_id,
                fixture.client_id,
                Money::from_major(1500),
            ))
            .await
            .unwrap();

        let result = fixture
            .orchestrator
            .book_session(make_request(&fixture, tx.clone()))
            .await;
        assert!(matches!(result, Err(BookingError::PaymentNotVerified { .. })));

        // Nothing changed; no refund needed for an uncompleted payment.
        let record = fixture.payments.find_by_transaction(&tx).await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Pending);
        assert_eq!(fixture.calendar.event_count(), 0);
        assert_eq!(fixture.payment_gateway.refund_calls(), 0);
    }

    #[tokio::test]
    async fn test_verification_outage() {
        let fixture = setup().await;
        let tx = seed_paid(&fixture, Money::from_major(1500)).await;
        fixture.payment_gateway.set_fail_on_verify(true);

        let result = fixture
            .orchestrator
            .book_session(make_request(&fixture, tx))
            .await;
        assert!(matches!(
            result,
            Err(BookingError::PaymentVerificationFailed(_))
        ));
        assert_eq!(fixture.calendar.event_count(), 0);
    }

    #[tokio::test]
    async fn test_amount_mismatch() {
        let fixture = setup().await;
        let tx = fixture
            .payment_gateway
            .seed_payment(Money::from_major(900), VerifyStatus::Completed);
        fixture
            .payments
            .insert(&PaymentRecord::pending(
                tx.clone(),
                fixture.therapist_id,
                fixture.client_id,
                Money::from_major(1500),
            ))
            .await
            .unwrap();

        let result = fixture
            .orchestrator
            .book_session(make_request(&fixture, tx.clone()))
            .await;
        assert!(matches!(result, Err(BookingError::AmountMismatch { .. })));

        let record = fixture.payments.find_by_transaction(&tx).await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_missing_ledger_record() {
        let fixture = setup().await;
        let tx = fixture
            .payment_gateway
            .seed_payment(Money::from_major(1500), VerifyStatus::Completed);

        let result = fixture
            .orchestrator
            .book_session(make_request(&fixture, tx))
            .await;
        assert!(matches!(
            result,
            Err(BookingError::PaymentRecordNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_calendar_failure_refunds_payment() {
        let fixture = setup().await;
        let tx = seed_paid(&fixture, Money::from_major(1500)).await;
        fixture.calendar.set_fail_on_create(true);

        let result = fixture
            .orchestrator
            .book_session(make_request(&fixture, tx.clone()))
            .await;
        assert!(matches!(result, Err(BookingError::CalendarCreateFailed(_))));

        let record = fixture.payments.find_by_transaction(&tx).await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Refunded);
        assert_eq!(fixture.payment_gateway.refund_calls(), 1);
        assert_eq!(fixture.sessions.session_count().await, 0);
        assert!(fixture.notifier.booked().is_empty());
    }

    #[tokio::test]
    async fn test_persist_failure_cleans_calendar_then_refunds() {
        let fixture = setup().await;
        let tx = seed_paid(&fixture, Money::from_major(1500)).await;
        fixture.sessions.set_fail_on_insert(true);

        let result = fixture
            .orchestrator
            .book_session(make_request(&fixture, tx.clone()))
            .await;
        assert!(matches!(result, Err(BookingError::SessionPersistFailed(_))));

        // Event was created, then cleaned up; payment refunded after.
        assert_eq!(fixture.calendar.event_count(), 0);
        assert_eq!(fixture.calendar.delete_attempts(), 1);
        let record = fixture.payments.find_by_transaction(&tx).await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn test_cleanup_failure_does_not_block_refund() {
        let fixture = setup().await;
        let tx = seed_paid(&fixture, Money::from_major(1500)).await;
        fixture.sessions.set_fail_on_insert(true);
        fixture.calendar.set_fail_on_delete(true);

        let result = fixture
            .orchestrator
            .book_session(make_request(&fixture, tx.clone()))
            .await;
        assert!(matches!(result, Err(BookingError::SessionPersistFailed(_))));

        // Calendar cleanup failed but the refund still went out.
        assert_eq!(fixture.calendar.event_count(), 1);
        let record = fixture.payments.find_by_transaction(&tx).await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Refunded);
        assert_eq!(fixture.payment_gateway.refund_calls(), 1);
    }

    #[tokio::test]
    async fn test_refund_failure_leaves_record_paid() {
        let fixture = setup().await;
        let tx = seed_paid(&fixture, Money::from_major(1500)).await;
        fixture.calendar.set_fail_on_create(true);
        fixture.payment_gateway.set_fail_on_refund(true);

        let result = fixture
            .orchestrator
            .book_session(make_request(&fixture, tx.clone()))
            .await;
        // The original step failure surfaces, not the refund failure.
        assert!(matches!(result, Err(BookingError::CalendarCreateFailed(_))));

        let record = fixture.payments.find_by_transaction(&tx).await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_initiate_payment_opens_pending_record() {
        let fixture = setup().await;

        let initiated = fixture
            .orchestrator
            .initiate_payment(fixture.therapist_id, fixture.client_id, Money::from_major(1500))
            .await
            .unwrap();

        assert!(initiated.payment_url.contains(initiated.transaction_id.as_str()));
        let record = fixture
            .payments
            .find_by_transaction(&initiated.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, PaymentStatus::Pending);
        assert_eq!(record.amount, Money::from_major(1500));
    }

    #[tokio::test]
    async fn test_initiate_payment_rejects_non_positive_amount() {
        let fixture = setup().await;

        let result = fixture
            .orchestrator
            .initiate_payment(fixture.therapist_id, fixture.client_id, Money::zero())
            .await;
        assert!(matches!(result, Err(BookingError::InvalidAmount(_))));
    }
}

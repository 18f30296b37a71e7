//! Saga orchestration for booking and cancelling therapy sessions.
//!
//! The booking saga runs verify payment → mark paid → create calendar
//! event → persist session; failures after the payment leg compensate
//! in reverse order of side effects (calendar cleanup before refund).
//!
//! The cancellation saga checks its preconditions, removes the provider
//! event fail-fast, cancels the session record, then refunds best
//! effort; once the record is cancelled it never rolls back.

pub mod booking;
pub mod cancellation;
pub mod error;
pub mod notify;
pub mod state;

pub use booking::{BookingOrchestrator, BookingRequest, DEFAULT_CALL_TIMEOUT};
pub use cancellation::{
    CancellationOrchestrator, CancellationOutcome, CancellationRequest, RefundOutcome,
};
pub use error::{BookingError, CancellationError};
pub use notify::{LogNotifier, NotificationSink, RecordingNotifier};
pub use state::SagaState;

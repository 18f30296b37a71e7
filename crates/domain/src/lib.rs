//! Domain layer for the teletherapy booking platform.
//!
//! Holds the entities the booking and cancellation sagas coordinate:
//! therapy sessions with their lifecycle state machine, the payment
//! ledger keyed by provider transaction id, per-therapist calendar
//! credentials, and the value objects shared between them.

pub mod credential;
pub mod error;
pub mod money;
pub mod party;
pub mod payment;
pub mod session;

pub use credential::OAuthCredential;
pub use error::DomainError;
pub use money::Money;
pub use party::{Party, PartyRole};
pub use payment::{PaymentRecord, PaymentStatus};
pub use session::{CancelledBy, Cancellation, Session, SessionStatus};

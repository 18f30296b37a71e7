//! Shared identifier types used across the booking platform.

mod ids;

pub use ids::{PaymentId, SessionId, TransactionId, UserId};

//! Gateways to the external calendar and payment providers.
//!
//! The orchestrators in the saga crate only ever see the trait surfaces
//! here; provider-specific error shapes stay behind them. Currency
//! conversion to minor units and idempotent-delete normalization both
//! happen at this boundary and nowhere else.

pub mod calendar;
pub mod error;
pub mod payment;
pub mod provider;

pub use calendar::{CalendarGateway, CreatedEvent, EventDetails, InMemoryCalendarGateway};
pub use error::GatewayError;
pub use payment::{
    CustomerInfo, InMemoryPaymentGateway, InitiatePayment, InitiatedPayment, PaymentGateway,
    RefundReceipt, Verification, VerifyStatus,
};
pub use provider::{
    CalendarProvider, CredentialCalendarGateway, DeleteOutcome, InMemoryCalendarProvider,
    ProviderError, RefreshedToken,
};

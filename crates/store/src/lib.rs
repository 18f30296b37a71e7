//! Durable stores behind the booking and cancellation sagas.
//!
//! Each store is a small trait with two implementations: an in-memory
//! one for tests and local development, and a PostgreSQL one for
//! production. The session record and the payment ledger deliberately
//! live in separate stores with no shared transaction — the sagas exist
//! to keep them consistent.

pub mod credential;
pub mod error;
pub mod memory;
pub mod payment;
pub mod postgres;
pub mod session;
pub mod users;

pub use credential::CredentialStore;
pub use error::{Result, StoreError};
pub use memory::{
    InMemoryCredentialStore, InMemoryPaymentStore, InMemorySessionStore, InMemoryUserDirectory,
};
pub use payment::PaymentStore;
pub use postgres::{PostgresCredentialStore, PostgresPaymentStore, PostgresSessionStore};
pub use session::SessionStore;
pub use users::UserDirectory;

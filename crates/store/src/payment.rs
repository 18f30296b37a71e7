//! Payment ledger store trait.

use std::sync::Arc;

use async_trait::async_trait;
use common::TransactionId;
use domain::PaymentRecord;

use crate::error::Result;

/// Durable ledger of payment attempts, keyed by provider transaction id.
///
/// Independent of the session store: a payment record exists before any
/// session does.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts a new pending record at initiation time.
    async fn insert(&self, record: &PaymentRecord) -> Result<()>;

    /// Loads a record by its provider transaction id.
    async fn find_by_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<PaymentRecord>>;

    /// Persists the current state of an existing record.
    ///
    /// Returns the stored record, or `None` if no row with that
    /// transaction id exists.
    async fn update(&self, record: &PaymentRecord) -> Result<Option<PaymentRecord>>;
}

#[async_trait]
impl<T: PaymentStore + ?Sized> PaymentStore for Arc<T> {
    async fn insert(&self, record: &PaymentRecord) -> Result<()> {
        (**self).insert(record).await
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<PaymentRecord>> {
        (**self).find_by_transaction(transaction_id).await
    }

    async fn update(&self, record: &PaymentRecord) -> Result<Option<PaymentRecord>> {
        (**self).update(record).await
    }
}

//! In-memory store implementations for testing and local development.
//!
//! Same interfaces as the PostgreSQL implementations, plus fault
//! toggles so saga tests can simulate store unavailability.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{SessionId, TransactionId, UserId};
use domain::{OAuthCredential, Party, PaymentRecord, Session};
use tokio::sync::RwLock;

use crate::credential::CredentialStore;
use crate::error::{Result, StoreError};
use crate::payment::PaymentStore;
use crate::session::SessionStore;
use crate::users::UserDirectory;

/// In-memory session store.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
    fail_on_insert: Arc<AtomicBool>,
}

impl InMemorySessionStore {
    /// Creates a new empty in-memory session store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail on the next insert call.
    pub fn set_fail_on_insert(&self, fail: bool) {
        self.fail_on_insert.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of stored sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: &Session) -> Result<()> {
        if self.fail_on_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "session store unavailable".to_string(),
            ));
        }
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: SessionId) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn update(&self, session: &Session) -> Result<Option<Session>> {
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(&session.id) {
            return Ok(None);
        }
        sessions.insert(session.id, session.clone());
        Ok(Some(session.clone()))
    }

    async fn delete_by_id(&self, id: SessionId) -> Result<()> {
        self.sessions.write().await.remove(&id);
        Ok(())
    }
}

/// In-memory payment ledger.
#[derive(Clone, Default)]
pub struct InMemoryPaymentStore {
    records: Arc<RwLock<HashMap<TransactionId, PaymentRecord>>>,
}

impl InMemoryPaymentStore {
    /// Creates a new empty in-memory payment ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, record: &PaymentRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.transaction_id.clone(), record.clone());
        Ok(())
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<PaymentRecord>> {
        Ok(self.records.read().await.get(transaction_id).cloned())
    }

    async fn update(&self, record: &PaymentRecord) -> Result<Option<PaymentRecord>> {
        let mut records = self.records.write().await;
        if !records.contains_key(&record.transaction_id) {
            return Ok(None);
        }
        records.insert(record.transaction_id.clone(), record.clone());
        Ok(Some(record.clone()))
    }
}

/// In-memory credential store.
#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    credentials: Arc<RwLock<HashMap<UserId, OAuthCredential>>>,
}

impl InMemoryCredentialStore {
    /// Creates a new empty in-memory credential store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_user(&self, user_id: UserId) -> Result<Option<OAuthCredential>> {
        Ok(self.credentials.read().await.get(&user_id).cloned())
    }

    async fn save(&self, credential: &OAuthCredential) -> Result<()> {
        self.credentials
            .write()
            .await
            .insert(credential.user_id, credential.clone());
        Ok(())
    }
}

/// In-memory user directory.
#[derive(Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<UserId, Party>>>,
}

impl InMemoryUserDirectory {
    /// Creates a new empty in-memory user directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a party, returning its id.
    pub async fn add(&self, party: Party) -> UserId {
        let id = party.id;
        self.users.write().await.insert(id, party);
        id
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Party>> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use domain::{CancelledBy, Money, PartyRole, SessionStatus};

    fn make_session() -> Session {
        Session::scheduled(
            SessionId::new(),
            UserId::new(),
            UserId::new(),
            Utc::now() + Duration::days(2),
            60,
            "https://meet.example.com/x",
            "EVT-1",
            TransactionId::new("PIDX-1"),
        )
    }

    #[tokio::test]
    async fn test_session_insert_and_find() {
        let store = InMemorySessionStore::new();
        let session = make_session();

        store.insert(&session).await.unwrap();
        let loaded = store.find_by_id(session.id).await.unwrap().unwrap();
        assert_eq!(loaded, session);
    }

    #[tokio::test]
    async fn test_session_update_missing_returns_none() {
        let store = InMemorySessionStore::new();
        let session = make_session();
        assert!(store.update(&session).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_update_persists_cancellation() {
        let store = InMemorySessionStore::new();
        let mut session = make_session();
        store.insert(&session).await.unwrap();

        session
            .cancel(Some("moved".into()), CancelledBy::Client, Utc::now())
            .unwrap();
        let updated = store.update(&session).await.unwrap().unwrap();
        assert_eq!(updated.status, SessionStatus::Cancelled);

        let loaded = store.find_by_id(session.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SessionStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_fail_on_insert() {
        let store = InMemorySessionStore::new();
        store.set_fail_on_insert(true);

        let result = store.insert(&make_session()).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_payment_keyed_by_transaction() {
        let store = InMemoryPaymentStore::new();
        let record = PaymentRecord::pending(
            TransactionId::new("PIDX-9"),
            UserId::new(),
            UserId::new(),
            Money::from_major(1200),
        );
        store.insert(&record).await.unwrap();

        let loaded = store
            .find_by_transaction(&TransactionId::new("PIDX-9"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, record);

        assert!(
            store
                .find_by_transaction(&TransactionId::new("PIDX-0"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_credential_save_is_upsert() {
        let store = InMemoryCredentialStore::new();
        let user_id = UserId::new();
        let mut cred =
            OAuthCredential::new(user_id, "old", "rt", Utc::now() - Duration::minutes(5));
        store.save(&cred).await.unwrap();

        cred.apply_refresh("new", Utc::now() + Duration::hours(1));
        store.save(&cred).await.unwrap();

        let loaded = store.find_by_user(user_id).await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "new");
    }

    #[tokio::test]
    async fn test_user_directory_lookup() {
        let directory = InMemoryUserDirectory::new();
        let party = Party::new(
            UserId::new(),
            "Dr. Maya Shrestha",
            "maya@example.com",
            PartyRole::Therapist,
        );
        let id = directory.add(party.clone()).await;

        assert_eq!(directory.find_by_id(id).await.unwrap(), Some(party));
        assert!(directory.find_by_id(UserId::new()).await.unwrap().is_none());
    }
}

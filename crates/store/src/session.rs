//! Session store trait.

use std::sync::Arc;

use async_trait::async_trait;
use common::SessionId;
use domain::Session;

use crate::error::Result;

/// Durable record of therapy sessions, one row per booked session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts a freshly booked session.
    async fn insert(&self, session: &Session) -> Result<()>;

    /// Loads a session by id.
    async fn find_by_id(&self, id: SessionId) -> Result<Option<Session>>;

    /// Persists the current state of an existing session.
    ///
    /// Returns the stored session, or `None` if no row with that id
    /// exists anymore.
    async fn update(&self, session: &Session) -> Result<Option<Session>>;

    /// Deletes a session row.
    async fn delete_by_id(&self, id: SessionId) -> Result<()>;
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn insert(&self, session: &Session) -> Result<()> {
        (**self).insert(session).await
    }

    async fn find_by_id(&self, id: SessionId) -> Result<Option<Session>> {
        (**self).find_by_id(id).await
    }

    async fn update(&self, session: &Session) -> Result<Option<Session>> {
        (**self).update(session).await
    }

    async fn delete_by_id(&self, id: SessionId) -> Result<()> {
        (**self).delete_by_id(id).await
    }
}

//! User directory trait.
//!
//! Identity storage is owned elsewhere; the sagas only need to resolve
//! a user id to a name, an email, and a role.

use std::sync::Arc;

use async_trait::async_trait;
use common::UserId;
use domain::Party;

use crate::error::Result;

/// Read-only lookup of session parties.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolves a user id to a party, or `None` if unknown.
    async fn find_by_id(&self, id: UserId) -> Result<Option<Party>>;
}

#[async_trait]
impl<T: UserDirectory + ?Sized> UserDirectory for Arc<T> {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Party>> {
        (**self).find_by_id(id).await
    }
}

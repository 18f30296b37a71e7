//! Calendar credential store trait.

use std::sync::Arc;

use async_trait::async_trait;
use common::UserId;
use domain::OAuthCredential;

use crate::error::Result;

/// Store of per-therapist calendar OAuth credentials, unique per user.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Loads the credential for a user.
    async fn find_by_user(&self, user_id: UserId) -> Result<Option<OAuthCredential>>;

    /// Upserts the credential for its user.
    async fn save(&self, credential: &OAuthCredential) -> Result<()>;
}

#[async_trait]
impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    async fn find_by_user(&self, user_id: UserId) -> Result<Option<OAuthCredential>> {
        (**self).find_by_user(user_id).await
    }

    async fn save(&self, credential: &OAuthCredential) -> Result<()> {
        (**self).save(credential).await
    }
}

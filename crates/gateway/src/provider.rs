//! Credential-refreshing calendar gateway over a raw provider client.
//!
//! [`CredentialCalendarGateway`] is the production implementation of
//! [`CalendarGateway`]: it resolves the therapist's stored OAuth
//! credential, refreshes it when expired (persisting the new token
//! before any provider call returns), and classifies raw provider
//! failures into [`GatewayError`] kinds.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::UserId;
use domain::OAuthCredential;
use store::CredentialStore;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::calendar::{CalendarGateway, CreatedEvent, EventDetails};
use crate::error::GatewayError;

/// Raw failure reported by a provider client, classified by the gateway.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

/// Outcome of a provider-side event deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The event existed and was deleted.
    Deleted,
    /// The provider reported the event as already absent (410-equivalent).
    AlreadyGone,
}

/// A refreshed access token from the provider's token endpoint.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expiry_date: DateTime<Utc>,
}

/// Raw calendar provider operations, one method per remote call.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Exchanges a refresh token for a new access token.
    async fn refresh_access_token(&self, refresh_token: &str)
    -> Result<RefreshedToken, ProviderError>;

    /// Creates an event on the calendar the token grants access to.
    async fn insert_event(
        &self,
        access_token: &str,
        details: &EventDetails,
    ) -> Result<CreatedEvent, ProviderError>;

    /// Removes an event, distinguishing "already gone" from real failure.
    async fn remove_event(
        &self,
        access_token: &str,
        provider_event_id: &str,
    ) -> Result<DeleteOutcome, ProviderError>;
}

/// Calendar gateway that owns credential lookup and refresh.
pub struct CredentialCalendarGateway<P, C> {
    provider: P,
    credentials: C,
    /// Serializes the read-check-refresh-write sequence per therapist so
    /// two concurrent calendar operations cannot clobber each other's
    /// freshly refreshed token.
    refresh_locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl<P, C> CredentialCalendarGateway<P, C>
where
    P: CalendarProvider,
    C: CredentialStore,
{
    /// Creates a gateway over a provider client and credential store.
    pub fn new(provider: P, credentials: C) -> Self {
        Self {
            provider,
            credentials,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn refresh_lock(&self, therapist_id: UserId) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        locks.entry(therapist_id).or_default().clone()
    }

    /// Loads the therapist's credential, refreshing it if expired.
    ///
    /// The refreshed token is persisted before this returns, so a crash
    /// after refresh never leaves the store holding a stale token that
    /// the provider has already rotated past.
    pub async fn get_valid_credential(
        &self,
        therapist_id: UserId,
    ) -> Result<OAuthCredential, GatewayError> {
        let credential = self
            .credentials
            .find_by_user(therapist_id)
            .await?
            .ok_or(GatewayError::CredentialMissing(therapist_id))?;

        if !credential.is_expired(Utc::now()) {
            return Ok(credential);
        }

        let lock = self.refresh_lock(therapist_id).await;
        let _guard = lock.lock().await;

        // Re-read under the lock: a concurrent caller may have already
        // refreshed while we waited.
        let mut credential = self
            .credentials
            .find_by_user(therapist_id)
            .await?
            .ok_or(GatewayError::CredentialMissing(therapist_id))?;

        if credential.is_expired(Utc::now()) {
            let refreshed = self
                .provider
                .refresh_access_token(&credential.refresh_token)
                .await
                .map_err(|e| GatewayError::CredentialRefreshFailed {
                    user_id: therapist_id,
                    reason: e.to_string(),
                })?;

            credential.apply_refresh(refreshed.access_token, refreshed.expiry_date);
            self.credentials.save(&credential).await?;
            tracing::info!(%therapist_id, "calendar credential refreshed");
        }

        Ok(credential)
    }
}

#[async_trait]
impl<P, C> CalendarGateway for CredentialCalendarGateway<P, C>
where
    P: CalendarProvider,
    C: CredentialStore,
{
    async fn has_credential(&self, therapist_id: UserId) -> Result<bool, GatewayError> {
        Ok(self.credentials.find_by_user(therapist_id).await?.is_some())
    }

    async fn create_event(
        &self,
        therapist_id: UserId,
        details: EventDetails,
    ) -> Result<CreatedEvent, GatewayError> {
        let credential = self.get_valid_credential(therapist_id).await?;

        self.provider
            .insert_event(&credential.access_token, &details)
            .await
            .map_err(|e| GatewayError::CalendarCreateFailed(e.to_string()))
    }

    async fn delete_event(
        &self,
        therapist_id: UserId,
        provider_event_id: &str,
    ) -> Result<(), GatewayError> {
        let credential = self.get_valid_credential(therapist_id).await?;

        match self
            .provider
            .remove_event(&credential.access_token, provider_event_id)
            .await
        {
            Ok(DeleteOutcome::Deleted) => Ok(()),
            Ok(DeleteOutcome::AlreadyGone) => {
                tracing::debug!(provider_event_id, "event already gone at provider");
                Ok(())
            }
            Err(e) => Err(GatewayError::CalendarDeleteFailed(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct InMemoryProviderState {
    events: HashMap<String, EventDetails>,
    next_id: u32,
    refresh_count: u32,
    fail_on_refresh: bool,
    fail_on_insert: bool,
}

/// In-memory calendar provider for testing the credential flow.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCalendarProvider {
    state: Arc<std::sync::RwLock<InMemoryProviderState>>,
}

impl InMemoryCalendarProvider {
    /// Creates a new in-memory provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the provider to fail token refreshes.
    pub fn set_fail_on_refresh(&self, fail: bool) {
        self.state.write().unwrap().fail_on_refresh = fail;
    }

    /// Configures the provider to fail event insertion.
    pub fn set_fail_on_insert(&self, fail: bool) {
        self.state.write().unwrap().fail_on_insert = fail;
    }

    /// Returns how many refreshes the provider has served.
    pub fn refresh_count(&self) -> u32 {
        self.state.read().unwrap().refresh_count
    }

    /// Returns true if an event exists with the given id.
    pub fn has_event(&self, provider_event_id: &str) -> bool {
        self.state
            .read()
            .unwrap()
            .events
            .contains_key(provider_event_id)
    }
}

#[async_trait]
impl CalendarProvider for InMemoryCalendarProvider {
    async fn refresh_access_token(
        &self,
        _refresh_token: &str,
    ) -> Result<RefreshedToken, ProviderError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_refresh {
            return Err(ProviderError("invalid_grant".to_string()));
        }
        state.refresh_count += 1;
        Ok(RefreshedToken {
            access_token: format!("access-{}", state.refresh_count),
            expiry_date: Utc::now() + Duration::hours(1),
        })
    }

    async fn insert_event(
        &self,
        _access_token: &str,
        details: &EventDetails,
    ) -> Result<CreatedEvent, ProviderError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_insert {
            return Err(ProviderError("quota exceeded".to_string()));
        }
        state.next_id += 1;
        let provider_event_id = format!("EVT-{:04}", state.next_id);
        state.events.insert(provider_event_id.clone(), details.clone());
        Ok(CreatedEvent {
            join_link: format!("https://meet.example.com/{}", provider_event_id),
            provider_event_id,
        })
    }

    async fn remove_event(
        &self,
        _access_token: &str,
        provider_event_id: &str,
    ) -> Result<DeleteOutcome, ProviderError> {
        let mut state = self.state.write().unwrap();
        match state.events.remove(provider_event_id) {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => Ok(DeleteOutcome::AlreadyGone),
        }
    }
}

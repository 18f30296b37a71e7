//! Calendar gateway trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::UserId;

use crate::error::GatewayError;

/// What to put on the therapist's calendar for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDetails {
    pub title: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Emails of both parties.
    pub attendees: Vec<String>,
}

/// Result of a successful event creation.
#[derive(Debug, Clone)]
pub struct CreatedEvent {
    /// Provider-assigned event id, needed for later deletion.
    pub provider_event_id: String,
    /// Opaque join link for the meeting.
    pub join_link: String,
}

/// Trait for calendar operations against the remote provider.
///
/// Implementations handle credential lookup and refresh internally;
/// callers only name the therapist. Deleting an event the provider
/// reports as already gone is success, never an error.
#[async_trait]
pub trait CalendarGateway: Send + Sync {
    /// Returns true if the therapist has a stored calendar credential.
    async fn has_credential(&self, therapist_id: UserId) -> Result<bool, GatewayError>;

    /// Creates a calendar event on the therapist's calendar.
    async fn create_event(
        &self,
        therapist_id: UserId,
        details: EventDetails,
    ) -> Result<CreatedEvent, GatewayError>;

    /// Deletes a calendar event. Idempotent: an already-absent event is
    /// treated as successfully deleted.
    async fn delete_event(
        &self,
        therapist_id: UserId,
        provider_event_id: &str,
    ) -> Result<(), GatewayError>;
}

#[async_trait]
impl<T: CalendarGateway + ?Sized> CalendarGateway for Arc<T> {
    async fn has_credential(&self, therapist_id: UserId) -> Result<bool, GatewayError> {
        (**self).has_credential(therapist_id).await
    }

    async fn create_event(
        &self,
        therapist_id: UserId,
        details: EventDetails,
    ) -> Result<CreatedEvent, GatewayError> {
        (**self).create_event(therapist_id, details).await
    }

    async fn delete_event(
        &self,
        therapist_id: UserId,
        provider_event_id: &str,
    ) -> Result<(), GatewayError> {
        (**self).delete_event(therapist_id, provider_event_id).await
    }
}

#[derive(Debug, Default)]
struct InMemoryCalendarState {
    events: HashMap<String, EventDetails>,
    disconnected: HashSet<UserId>,
    next_id: u32,
    fail_on_create: bool,
    fail_on_delete: bool,
    delete_attempts: u32,
}

/// In-memory calendar gateway for testing.
///
/// Every therapist is considered connected unless explicitly
/// disconnected; failure toggles simulate provider outages.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCalendarGateway {
    state: Arc<RwLock<InMemoryCalendarState>>,
}

impl InMemoryCalendarGateway {
    /// Creates a new in-memory calendar gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to fail on the next create call.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Configures the gateway to fail on the next delete call.
    pub fn set_fail_on_delete(&self, fail: bool) {
        self.state.write().unwrap().fail_on_delete = fail;
    }

    /// Marks a therapist as having no calendar connection.
    pub fn set_disconnected(&self, therapist_id: UserId) {
        self.state.write().unwrap().disconnected.insert(therapist_id);
    }

    /// Removes an event out-of-band, simulating deletion directly at the
    /// provider.
    pub fn remove_event_out_of_band(&self, provider_event_id: &str) {
        self.state.write().unwrap().events.remove(provider_event_id);
    }

    /// Returns the number of live provider events.
    pub fn event_count(&self) -> usize {
        self.state.read().unwrap().events.len()
    }

    /// Returns true if an event exists with the given id.
    pub fn has_event(&self, provider_event_id: &str) -> bool {
        self.state
            .read()
            .unwrap()
            .events
            .contains_key(provider_event_id)
    }

    /// Returns how many delete calls were attempted.
    pub fn delete_attempts(&self) -> u32 {
        self.state.read().unwrap().delete_attempts
    }
}

#[async_trait]
impl CalendarGateway for InMemoryCalendarGateway {
    async fn has_credential(&self, therapist_id: UserId) -> Result<bool, GatewayError> {
        Ok(!self.state.read().unwrap().disconnected.contains(&therapist_id))
    }

    async fn create_event(
        &self,
        therapist_id: UserId,
        details: EventDetails,
    ) -> Result<CreatedEvent, GatewayError> {
        let mut state = self.state.write().unwrap();

        if state.disconnected.contains(&therapist_id) {
            return Err(GatewayError::CredentialMissing(therapist_id));
        }
        if state.fail_on_create {
            return Err(GatewayError::CalendarCreateFailed(
                "provider rejected event".to_string(),
            ));
        }

        state.next_id += 1;
        let provider_event_id = format!("EVT-{:04}", state.next_id);
        let join_link = format!("https://meet.example.com/{}", provider_event_id);
        state.events.insert(provider_event_id.clone(), details);

        Ok(CreatedEvent {
            provider_event_id,
            join_link,
        })
    }

    async fn delete_event(
        &self,
        therapist_id: UserId,
        provider_event_id: &str,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.write().unwrap();
        state.delete_attempts += 1;

        if state.disconnected.contains(&therapist_id) {
            return Err(GatewayError::CredentialMissing(therapist_id));
        }
        if state.fail_on_delete {
            return Err(GatewayError::CalendarDeleteFailed(
                "provider unavailable".to_string(),
            ));
        }

        // Absent event means already deleted at the provider: success.
        state.events.remove(provider_event_id);
        Ok(())
    }
}

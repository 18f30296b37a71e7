//! Notification fan-out after saga completion.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::SessionId;
use domain::Session;

/// Receives notifications once a saga reaches a terminal success state.
///
/// Delivery is best effort and happens after the session record is
/// durable, so an implementation failing can never affect saga outcomes.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// A session was booked and persisted.
    async fn session_booked(&self, session: &Session);

    /// A session was cancelled and persisted.
    async fn session_cancelled(&self, session: &Session);
}

#[async_trait]
impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    async fn session_booked(&self, session: &Session) {
        (**self).session_booked(session).await;
    }

    async fn session_cancelled(&self, session: &Session) {
        (**self).session_cancelled(session).await;
    }
}

/// Sink that only emits structured log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn session_booked(&self, session: &Session) {
        tracing::info!(
            session_id = %session.id,
            therapist_id = %session.therapist_id,
            client_id = %session.client_id,
            scheduled_time = %session.scheduled_time,
            "session booked"
        );
    }

    async fn session_cancelled(&self, session: &Session) {
        tracing::info!(
            session_id = %session.id,
            therapist_id = %session.therapist_id,
            client_id = %session.client_id,
            "session cancelled"
        );
    }
}

/// Sink that records notified session ids, for tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    booked: Arc<RwLock<Vec<SessionId>>>,
    cancelled: Arc<RwLock<Vec<SessionId>>>,
}

impl RecordingNotifier {
    /// Creates a new recording notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session ids notified as booked, in order.
    pub fn booked(&self) -> Vec<SessionId> {
        self.booked.read().unwrap().clone()
    }

    /// Returns the session ids notified as cancelled, in order.
    pub fn cancelled(&self) -> Vec<SessionId> {
        self.cancelled.read().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn session_booked(&self, session: &Session) {
        self.booked.write().unwrap().push(session.id);
    }

    async fn session_cancelled(&self, session: &Session) {
        self.cancelled.write().unwrap().push(session.id);
    }
}

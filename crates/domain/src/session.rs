//! Therapy session entity and its lifecycle state machine.

use chrono::{DateTime, Duration, Utc};
use common::{SessionId, TransactionId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Hours before the scheduled time in which a client may no longer cancel.
pub const CLIENT_CANCELLATION_WINDOW_HOURS: i64 = 24;

/// The state of a session in its lifecycle.
///
/// State transitions:
/// ```text
/// Scheduled ──┬──► Completed
///             └──► Cancelled
/// ```
///
/// Both `Completed` and `Cancelled` are terminal; no transition out of
/// either is ever accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Session is booked, paid, and on the therapist's calendar.
    #[default]
    Scheduled,

    /// Session took place (terminal state).
    Completed,

    /// Session was cancelled before taking place (terminal state).
    Cancelled,
}

impl SessionStatus {
    /// Returns true if the session can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, SessionStatus::Scheduled)
    }

    /// Returns true if the session can be marked completed in this state.
    pub fn can_complete(&self) -> bool {
        matches!(self, SessionStatus::Scheduled)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which party initiated a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelledBy {
    Client,
    Therapist,
}

impl CancelledBy {
    /// Parses a caller-supplied initiator string.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "client" => Some(CancelledBy::Client),
            "therapist" => Some(CancelledBy::Therapist),
            _ => None,
        }
    }

    /// Returns the initiator name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelledBy::Client => "client",
            CancelledBy::Therapist => "therapist",
        }
    }
}

impl std::fmt::Display for CancelledBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audit metadata recorded when a session is cancelled.
///
/// `reason` stays absent when the caller gave none; rendering a
/// placeholder is a presentation concern, not a data concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub reason: Option<String>,
    pub cancelled_by: CancelledBy,
    pub cancelled_at: DateTime<Utc>,
}

/// A booked therapy session.
///
/// Jointly owned by its therapist and client. A session is only ever
/// persisted with status `scheduled` after the calendar provider
/// confirmed the meeting event, so `calendar_event_id` being set implies
/// a real (or since-reconciled) provider event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub therapist_id: UserId,
    pub client_id: UserId,
    pub scheduled_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub meeting_link: String,
    /// Provider-assigned event id, kept for later deletion.
    pub calendar_event_id: Option<String>,
    /// Provider transaction reference linking to the payment ledger.
    pub transaction_id: Option<TransactionId>,
    pub status: SessionStatus,
    pub cancellation: Option<Cancellation>,
    /// Private notes, visible only to the assigned therapist.
    pub therapist_notes: Option<String>,
    /// Notes visible to both parties.
    pub shared_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Creates a freshly booked session in `scheduled` state.
    #[allow(clippy::too_many_arguments)]
    pub fn scheduled(
        id: SessionId,
        therapist_id: UserId,
        client_id: UserId,
        scheduled_time: DateTime<Utc>,
        duration_minutes: u32,
        meeting_link: impl Into<String>,
        calendar_event_id: impl Into<String>,
        transaction_id: TransactionId,
    ) -> Self {
        Self {
            id,
            therapist_id,
            client_id,
            scheduled_time,
            duration_minutes,
            meeting_link: meeting_link.into(),
            calendar_event_id: Some(calendar_event_id.into()),
            transaction_id: Some(transaction_id),
            status: SessionStatus::Scheduled,
            cancellation: None,
            therapist_notes: None,
            shared_notes: None,
            created_at: Utc::now(),
        }
    }

    /// Returns the scheduled end of the session.
    pub fn end_time(&self) -> DateTime<Utc> {
        self.scheduled_time + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Returns true if a client-initiated cancellation is still allowed
    /// at `now` (strictly more than the window before the start).
    pub fn client_cancellation_open(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_time - now > Duration::hours(CLIENT_CANCELLATION_WINDOW_HOURS)
    }

    /// Cancels the session, recording who, why, and when.
    pub fn cancel(
        &mut self,
        reason: Option<String>,
        cancelled_by: CancelledBy,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.status.can_cancel() {
            return Err(DomainError::InvalidSessionTransition {
                session_id: self.id,
                from: self.status,
                to: SessionStatus::Cancelled,
            });
        }
        self.status = SessionStatus::Cancelled;
        self.cancellation = Some(Cancellation {
            reason,
            cancelled_by,
            cancelled_at: now,
        });
        Ok(())
    }

    /// Marks the session completed.
    pub fn complete(&mut self) -> Result<(), DomainError> {
        if !self.status.can_complete() {
            return Err(DomainError::InvalidSessionTransition {
                session_id: self.id,
                from: self.status,
                to: SessionStatus::Completed,
            });
        }
        self.status = SessionStatus::Completed;
        Ok(())
    }

    /// Replaces the therapist-private notes. Independent of shared notes.
    pub fn set_therapist_notes(&mut self, notes: impl Into<String>) {
        self.therapist_notes = Some(notes.into());
    }

    /// Replaces the notes visible to both parties.
    pub fn set_shared_notes(&mut self, notes: impl Into<String>) {
        self.shared_notes = Some(notes.into());
    }
}

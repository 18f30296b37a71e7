//! Parties to a therapy session.

use common::UserId;
use serde::{Deserialize, Serialize};

/// The role a user plays relative to a session.
///
/// Closed enum resolved once at the data-access boundary; business logic
/// matches on it instead of re-branching on a role string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    /// A client booking and attending sessions.
    Client,
    /// A therapist hosting sessions and owning a calendar connection.
    Therapist,
}

impl PartyRole {
    /// Returns the role name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyRole::Client => "client",
            PartyRole::Therapist => "therapist",
        }
    }
}

impl std::fmt::Display for PartyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A resolved party: the minimal identity the sagas need.
///
/// Loaded from the user directory; carries only the fields the booking
/// flow consumes (calendar event title/description and attendee emails).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: UserId,
    pub fullname: String,
    pub email: String,
    pub role: PartyRole,
}

impl Party {
    /// Creates a party record.
    pub fn new(
        id: UserId,
        fullname: impl Into<String>,
        email: impl Into<String>,
        role: PartyRole,
    ) -> Self {
        Self {
            id,
            fullname: fullname.into(),
            email: email.into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display() {
        assert_eq!(PartyRole::Client.to_string(), "client");
        assert_eq!(PartyRole::Therapist.to_string(), "therapist");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&PartyRole::Therapist).unwrap();
        assert_eq!(json, "\"therapist\"");
    }

    #[test]
    fn test_party_roundtrip() {
        let party = Party::new(UserId::new(), "Asha Rai", "asha@example.com", PartyRole::Client);
        let json = serde_json::to_string(&party).unwrap();
        let deserialized: Party = serde_json::from_str(&json).unwrap();
        assert_eq!(party, deserialized);
    }
}

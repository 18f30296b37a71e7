//! Per-therapist OAuth credential for calendar access.

use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};

/// The stored calendar OAuth credential for one therapist.
///
/// Unique per user; created when the therapist connects their calendar
/// and mutated in place on every refresh. This subsystem never deletes
/// it (disconnect lives elsewhere).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthCredential {
    pub user_id: UserId,
    pub access_token: String,
    pub refresh_token: String,
    pub expiry_date: DateTime<Utc>,
}

impl OAuthCredential {
    /// Creates a credential record.
    pub fn new(
        user_id: UserId,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expiry_date: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expiry_date,
        }
    }

    /// Returns true if the access token has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date <= now
    }

    /// Applies a refreshed access token and expiry in place.
    pub fn apply_refresh(&mut self, access_token: impl Into<String>, expiry_date: DateTime<Utc>) {
        self.access_token = access_token.into();
        self.expiry_date = expiry_date;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expiry_check() {
        let now = Utc::now();
        let live = OAuthCredential::new(UserId::new(), "at", "rt", now + Duration::hours(1));
        assert!(!live.is_expired(now));

        let stale = OAuthCredential::new(UserId::new(), "at", "rt", now - Duration::minutes(1));
        assert!(stale.is_expired(now));

        let boundary = OAuthCredential::new(UserId::new(), "at", "rt", now);
        assert!(boundary.is_expired(now));
    }

    #[test]
    fn test_apply_refresh_keeps_refresh_token() {
        let now = Utc::now();
        let mut cred = OAuthCredential::new(UserId::new(), "old", "rt", now);
        cred.apply_refresh("new", now + Duration::hours(1));

        assert_eq!(cred.access_token, "new");
        assert_eq!(cred.refresh_token, "rt");
        assert!(!cred.is_expired(now));
    }
}

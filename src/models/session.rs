//! Guest session models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-issued anonymous session, as returned by `GET /guest-session/{id}`.
///
/// Read-only to the client. Invalid once `active` is false or `expires_at`
/// has passed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestSession {
    #[serde(alias = "sessionId", alias = "id")]
    pub session_id: String,
    #[serde(rename = "createdAt", alias = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "expiresAt", alias = "expires_at")]
    pub expires_at: DateTime<Utc>,
    #[serde(alias = "isActive", alias = "is_active")]
    pub active: bool,
    #[serde(default, alias = "lastActive", skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
}

impl GuestSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// The client's own record of its session, kept across reloads.
///
/// `expires_at` starts as a local estimate (created + session TTL) and is
/// replaced by the backend's value after every successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSession {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl LocalSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_decode_backend_shape() {
        let session: GuestSession = serde_json::from_value(json!({
            "session_id": "session_abcdef0123456789",
            "createdAt": "2026-10-01T10:00:00Z",
            "expiresAt": "2026-10-08T10:00:00Z",
            "active": true,
            "last_active": "2026-10-02T09:30:00Z"
        }))
        .unwrap();

        assert_eq!(session.session_id, "session_abcdef0123456789");
        assert!(session.active);
        assert!(session.last_active.is_some());
        assert!(!session.is_expired(session.created_at));
        assert!(session.is_expired(session.expires_at));
        assert!(session.is_expired(session.expires_at + Duration::seconds(1)));
    }
}

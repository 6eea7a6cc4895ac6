use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// An authenticated session as issued by the auth service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

impl Session {
    /// Tokens within this margin of expiry are treated as expired.
    const EXPIRY_MARGIN_SECS: i64 = 60;

    pub(crate) fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(Self::EXPIRY_MARGIN_SECS) >= self.expires_at
    }

    pub(crate) fn user_id(&self) -> &str {
        &self.user.id
    }

    pub(crate) fn email(&self) -> &str {
        self.user.email.as_deref().unwrap_or("")
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

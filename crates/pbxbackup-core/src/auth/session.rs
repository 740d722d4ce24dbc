use std::fmt;

use chrono::{DateTime, Duration, Utc};

/// Token set produced by a completed login.
///
/// Only `ApiClient::login` builds one, and only after both the primary login
/// and the token exchange succeeded, so holding a session means `auth_token`
/// is set. The session never refreshes itself; once `is_expired` reports
/// true the caller logs in again.
#[derive(Clone)]
pub struct AuthenticatedSession {
    username: String,
    access_token: String,
    refresh_token: String,
    auth_token: String,
    expires_in: Option<i64>,
    created_at: DateTime<Utc>,
}

impl AuthenticatedSession {
    pub(crate) fn new(
        username: String,
        access_token: String,
        refresh_token: String,
        auth_token: String,
        expires_in: Option<i64>,
    ) -> Self {
        Self {
            username,
            access_token,
            refresh_token,
            auth_token,
            expires_in,
            created_at: Utc::now(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Access token from the primary login response. Not used for API calls.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Bearer token from the exchange call, sent on every authenticated request.
    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Expiry time advertised by the token exchange, if any. A lifetime too
    /// large to represent is treated as no expiry.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| self.created_at.checked_add_signed(lifetime))
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map(|at| now >= at).unwrap_or(false)
    }
}

impl fmt::Debug for AuthenticatedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedSession")
            .field("username", &self.username)
            .field("expires_in", &self.expires_in)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_in: Option<i64>) -> AuthenticatedSession {
        AuthenticatedSession::new(
            "admin".into(),
            "login-access".into(),
            "login-refresh".into(),
            "bearer".into(),
            expires_in,
        )
    }

    #[test]
    fn test_expiry() {
        let s = session(Some(60));
        assert!(!s.is_expired_at(s.created_at() + Duration::seconds(59)));
        assert!(s.is_expired_at(s.created_at() + Duration::seconds(60)));
    }

    #[test]
    fn test_unknown_expiry_never_expires() {
        let s = session(None);
        assert_eq!(s.expires_at(), None);
        assert!(!s.is_expired_at(s.created_at() + Duration::days(365)));
    }

    #[test]
    fn test_out_of_range_expiry_never_expires() {
        for secs in [i64::MAX, i64::MIN, i64::MAX / 1000] {
            let s = session(Some(secs));
            assert_eq!(s.expires_at(), None);
            assert!(!s.is_expired());
        }
    }

    #[test]
    fn test_debug_hides_tokens() {
        let rendered = format!("{:?}", session(None));
        assert!(!rendered.contains("bearer"));
        assert!(!rendered.contains("login-refresh"));
    }
}

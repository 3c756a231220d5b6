use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Proactive refresh window in seconds: a token within this much of expiry
/// is refreshed before use.
pub const REFRESH_BUFFER_SECS: i64 = 300;

/// Wire shape of a token endpoint response (RFC 6749 §5.1)
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Persisted OAuth session for one upstream server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthSession {
    pub access_token: String,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Absolute expiry; absent means the token does not expire
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthSession {
    /// Build a session from a token response received at `now`
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        let expires_at = response
            .expires_in
            .map(|secs| now + Duration::seconds(secs as i64));

        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            refresh_token: response.refresh_token,
            scope: response.scope,
            expires_at,
        }
    }

    /// Merge a refresh response into this session
    ///
    /// Refresh responses may omit the refresh token; the previously issued
    /// one stays valid in that case.
    pub fn refreshed_with(&self, response: TokenResponse, now: DateTime<Utc>) -> Self {
        let mut next = Self::from_response(response, now);
        if next.refresh_token.is_none() {
            next.refresh_token = self.refresh_token.clone();
        }
        next
    }

    /// Whether the access token has expired at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Whether the token is within the proactive refresh window
    ///
    /// A session without an expiry never needs refresh.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| at - Duration::seconds(REFRESH_BUFFER_SECS) <= now)
    }

    /// A session is usable if it can produce an access token, now or after a
    /// refresh. Sessions failing this are treated as absent by the store.
    pub fn is_usable(&self) -> bool {
        !self.access_token.is_empty() || self.refresh_token.is_some()
    }
}

/// Cached dynamic client registration (RFC 7591)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_in: Option<i64>) -> OAuthSession {
        OAuthSession {
            access_token: "at".into(),
            token_type: "Bearer".into(),
            refresh_token: Some("rt".into()),
            scope: None,
            expires_at: expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }

    #[test]
    fn no_expiry_never_needs_refresh() {
        let s = session(None);
        assert!(!s.is_expired(Utc::now()));
        assert!(!s.needs_refresh(Utc::now()));
    }

    #[test]
    fn refresh_triggers_inside_five_minute_buffer() {
        assert!(session(Some(60)).needs_refresh(Utc::now()));
        assert!(!session(Some(3600)).needs_refresh(Utc::now()));
    }

    #[test]
    fn expired_session_is_expired() {
        assert!(session(Some(-10)).is_expired(Utc::now()));
        assert!(!session(Some(3600)).is_expired(Utc::now()));
    }

    #[test]
    fn refresh_keeps_old_refresh_token_when_omitted() {
        let old = session(Some(10));
        let refreshed = old.refreshed_with(
            TokenResponse {
                access_token: "at2".into(),
                token_type: "Bearer".into(),
                expires_in: Some(3600),
                refresh_token: None,
                scope: None,
            },
            Utc::now(),
        );

        assert_eq!(refreshed.access_token, "at2");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("rt"));
    }
}

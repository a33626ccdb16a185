use std::{
    fmt,
    time::{Duration, SystemTime},
};

use serde::{de::Error as _, Deserialize, Serialize};

use crate::error::{Error, Result};

/// How long before its actual expiry an access token is already considered expired, to account for clock skew and
/// request latency.
pub const EXPIRY_SKEW: Duration = Duration::from_secs(30);

/// An access token and an optional refresh token, as issued by the Spotify accounts service.
///
/// The [Authenticator](crate::client::Authenticator) replaces its token wholesale every time the access token is
/// refreshed. A token may be serialized and later [restored](crate::client::Authenticator::restore_token) to resume a
/// session in another process; the expiry time is serialized as Unix seconds.
///
/// The `Debug` implementation does not print either secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(with = "crate::util::unix_seconds")]
    expires_at: SystemTime,
}

#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: u64,

    // these fields are in the response but the library doesn't need them
    #[allow(dead_code)]
    scope: Option<String>,
    #[allow(dead_code)]
    token_type: Option<String>,
}

impl Token {
    pub fn new<S>(access_token: S, refresh_token: Option<String>, expires_at: SystemTime) -> Self
    where
        S: Into<String>,
    {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at,
        }
    }

    pub(crate) fn from_response(response: TokenResponse, previous_refresh_token: Option<String>) -> Result<Self> {
        let expires_at = SystemTime::now()
            .checked_add(Duration::from_secs(response.expires_in))
            .ok_or_else(|| {
                Error::InvalidResponse(serde_json::Error::custom(format!(
                    "token expiry of {} seconds is out of range",
                    response.expires_in
                )))
            })?;

        // Spotify doesn't always rotate the refresh token
        Ok(Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh_token),
            expires_at,
        })
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    /// Returns whether the access token has expired or will expire within [EXPIRY_SKEW].
    pub fn is_expired(&self) -> bool {
        self.expires_within(EXPIRY_SKEW)
    }

    fn expires_within(&self, margin: Duration) -> bool {
        match self.expires_at.checked_sub(margin) {
            Some(deadline) => deadline <= SystemTime::now(),
            None => true,
        }
    }
}

impl TokenResponse {
    pub(crate) fn expires_in(&self) -> u64 {
        self.expires_in
    }

    pub(crate) fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use super::*;

    #[test]
    fn token_within_skew_is_expired() {
        let token = Token::new("abc", None, SystemTime::now() + Duration::from_secs(10));
        assert!(token.is_expired());

        let token = Token::new("abc", None, SystemTime::now() + Duration::from_secs(3600));
        assert!(!token.is_expired());

        let token = Token::new("abc", None, SystemTime::now() - Duration::from_secs(1));
        assert!(token.is_expired());
    }

    #[test]
    fn token_from_response_expires_relative_to_now() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","expires_in":3600,"refresh_token":"xyz"}"#).unwrap();

        let before = SystemTime::now();
        let token = Token::from_response(response, None).unwrap();

        assert_eq!(token.access_token(), "abc");
        assert_eq!(token.refresh_token(), Some("xyz"));
        assert!(token.expires_at() >= before + Duration::from_secs(3600));
        assert!(token.expires_at() <= SystemTime::now() + Duration::from_secs(3600));
    }

    #[test]
    fn refresh_response_without_refresh_token_keeps_previous() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"new","token_type":"Bearer","expires_in":3600}"#).unwrap();

        let token = Token::from_response(response, Some("xyz".to_owned())).unwrap();
        assert_eq!(token.refresh_token(), Some("xyz"));
    }

    #[test]
    fn out_of_range_expires_in_is_invalid_response() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","expires_in":18446744073709551615}"#).unwrap();

        let result = Token::from_response(response, None);
        assert!(matches!(result, Err(Error::InvalidResponse(_))));
    }

    #[test]
    fn out_of_range_expires_at_fails_to_deserialize() {
        let result = serde_json::from_str::<Token>(r#"{"access_token":"abc","expires_at":18446744073709551615}"#);
        assert!(result.is_err());
    }

    #[test]
    fn token_serializes_expiry_as_unix_seconds() {
        let token = Token::new(
            "abc",
            Some("xyz".to_owned()),
            UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        );

        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "access_token": "abc", "refresh_token": "xyz", "expires_at": 1_700_000_000u64 })
        );

        let restored: Token = serde_json::from_value(json).unwrap();
        assert_eq!(restored, token);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let token = Token::new("very-secret", Some("also-secret".to_owned()), SystemTime::now());
        let debug = format!("{:?}", token);

        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("also-secret"));
    }
}

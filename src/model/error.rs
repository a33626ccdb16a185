use std::fmt::Display;

use serde::{de::Visitor, Deserialize};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct AuthenticationErrorResponse {
    pub error: AuthenticationErrorKind,
    #[serde(default)]
    pub error_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiError,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct ApiError {
    #[allow(dead_code)]
    pub status: u16,
    #[serde(default)]
    pub message: String,
}

/// Error codes the accounts service (RFC 6749 section 5.2) and the bearer token scheme (RFC 6750 section 3.1) use.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthenticationErrorKind {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnauthorizedClient,
    UnsupportedGrantType,
    InvalidScope,
    /// The access token was rejected by the Web API even after refreshing it.
    InvalidToken,

    Other(String),
}

impl AuthenticationErrorResponse {
    pub fn into_error(self) -> Error {
        Error::Authorization {
            error: self.error,
            description: self.error_description,
        }
    }
}

impl AuthenticationErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            AuthenticationErrorKind::InvalidRequest => "invalid_request",
            AuthenticationErrorKind::InvalidClient => "invalid_client",
            AuthenticationErrorKind::InvalidGrant => "invalid_grant",
            AuthenticationErrorKind::UnauthorizedClient => "unauthorized_client",
            AuthenticationErrorKind::UnsupportedGrantType => "unsupported_grant_type",
            AuthenticationErrorKind::InvalidScope => "invalid_scope",
            AuthenticationErrorKind::InvalidToken => "invalid_token",
            AuthenticationErrorKind::Other(other) => other,
        }
    }
}

impl Display for AuthenticationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for AuthenticationErrorKind {
    fn from(value: &str) -> Self {
        match value {
            "invalid_request" => AuthenticationErrorKind::InvalidRequest,
            "invalid_client" => AuthenticationErrorKind::InvalidClient,
            "invalid_grant" => AuthenticationErrorKind::InvalidGrant,
            "unauthorized_client" => AuthenticationErrorKind::UnauthorizedClient,
            "unsupported_grant_type" => AuthenticationErrorKind::UnsupportedGrantType,
            "invalid_scope" => AuthenticationErrorKind::InvalidScope,
            "invalid_token" => AuthenticationErrorKind::InvalidToken,

            other => AuthenticationErrorKind::Other(other.to_owned()),
        }
    }
}

impl<'de> Deserialize<'de> for AuthenticationErrorKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct AuthenticationErrorKindVisitor;

        impl<'de> Visitor<'de> for AuthenticationErrorKindVisitor {
            type Value = AuthenticationErrorKind;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("an OAuth error code string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(AuthenticationErrorKind::from(v))
            }
        }

        deserializer.deserialize_str(AuthenticationErrorKindVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_error_response_from_accounts_service() {
        let response: AuthenticationErrorResponse =
            serde_json::from_str(r#"{"error":"invalid_grant","error_description":"Invalid authorization code"}"#)
                .unwrap();

        assert_eq!(response.error, AuthenticationErrorKind::InvalidGrant);
        assert_eq!(response.error_description, "Invalid authorization code");
    }

    #[test]
    fn unknown_error_code_is_kept_verbatim() {
        let response: AuthenticationErrorResponse =
            serde_json::from_str(r#"{"error":"temporarily_unavailable"}"#).unwrap();

        assert_eq!(
            response.error,
            AuthenticationErrorKind::Other("temporarily_unavailable".to_owned())
        );
        assert_eq!(response.error.to_string(), "temporarily_unavailable");
        assert!(response.error_description.is_empty());
    }

    #[test]
    fn api_error_response_message() {
        let response: ApiErrorResponse =
            serde_json::from_str(r#"{"error":{"status":401,"message":"The access token expired"}}"#).unwrap();

        assert_eq!(response.error.message, "The access token expired");
    }
}

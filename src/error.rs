use thiserror::Error;

use crate::{model::error::AuthenticationErrorKind, scope::Scope};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Invalid client configuration: {0}")]
    Configuration(String),

    #[error("The given state does not match the original state. The callback may have been forged")]
    StateMismatch,

    #[error("Spotify rejected the authorization: {error}: {description}")]
    Authorization {
        error: AuthenticationErrorKind,
        description: String,
    },

    #[error("The refresh token is invalid or expired: {0}. The user should be reauthorized")]
    ReauthenticationRequired(String),

    #[error("The client has no authenticated user. Complete a login first")]
    NotAuthenticated,

    #[error("The token refresh was aborted before it completed")]
    RefreshAborted,

    #[error(
        "Request rate limit hit{}",
        .0.map(|seconds| format!("; retry after {} seconds", seconds)).unwrap_or_default()
    )]
    RateLimited(Option<u64>),

    #[error("The user hasn't granted the scopes required by the endpoint: {0:?}")]
    MissingScope(Vec<Scope>),

    #[error("Unhandled API error {status}: {payload}")]
    Api { status: u16, payload: serde_json::Value },

    #[error("Failed to parse response body: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("Token storage failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_message_includes_retry_after() {
        assert_eq!(
            Error::RateLimited(Some(5)).to_string(),
            "Request rate limit hit; retry after 5 seconds"
        );
        assert_eq!(Error::RateLimited(None).to_string(), "Request rate limit hit");
    }
}

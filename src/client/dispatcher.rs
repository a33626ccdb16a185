use log::{debug, error, warn};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Authenticator, TRANSPORT_RETRY_BACKOFF};
use crate::{
    error::{Error, Result},
    model::{
        error::{ApiErrorResponse, AuthenticationErrorKind},
        token::Token,
    },
};

/// Sends authenticated requests to the Spotify Web API.
///
/// Every request carries a valid access token from the [Authenticator]. Responses are handled as follows:
/// - any successful response is parsed as JSON; `204 No Content` and empty bodies result in `None`
/// - `401 Unauthorized` refreshes the access token once and retries the request once; a second 401 fails with an
///   [Authorization-error](Error::Authorization)
/// - `429 Too Many Requests` fails with a [RateLimited-error](Error::RateLimited) carrying the `Retry-After` seconds.
///   The request is never retried automatically
/// - any other status fails with an [Api-error](Error::Api)
/// - a network-level failure is retried once after a short backoff before failing with a
///   [Transport-error](Error::Transport)
#[derive(Debug, Clone)]
pub struct Dispatcher {
    authenticator: Authenticator,
    api_base_url: Url,
}

impl Dispatcher {
    /// Returns a new dispatcher that sends requests through the authenticator's HTTP client.
    pub fn new<S>(authenticator: Authenticator, api_base_url: S) -> Result<Self>
    where
        S: Into<String>,
    {
        let api_base_url = api_base_url.into();
        let mut api_base_url = Url::parse(&api_base_url).map_err(|err| {
            Error::Configuration(format!("the API base URL {:?} is invalid: {}", api_base_url, err))
        })?;

        // joining relative paths onto the base requires a trailing slash
        if !api_base_url.path().ends_with('/') {
            let path = format!("{}/", api_base_url.path());
            api_base_url.set_path(&path);
        }

        Ok(Self {
            authenticator,
            api_base_url,
        })
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Perform a single authenticated request against `path` relative to the API base URL and return the parsed JSON
    /// response body, if there is one.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        let url = self.endpoint_url(path)?;
        let mut token_refreshed = false;
        let mut transport_retried = false;

        loop {
            let token = self.authenticator.current_token().await?;
            debug!("{} {}", method, url);

            let response = match self.send(method.clone(), url.clone(), query, body, &token).await {
                Ok(response) => response,

                Err(err) if !transport_retried && is_transient(&err) => {
                    warn!(
                        "Request to {} failed: {}. Retrying in {:?}",
                        url, err, TRANSPORT_RETRY_BACKOFF
                    );

                    transport_retried = true;
                    tokio::time::sleep(TRANSPORT_RETRY_BACKOFF).await;
                    continue;
                }

                Err(err) => {
                    error!("Request to {} failed: {}", url, err);
                    return Err(err.into());
                }
            };

            match response.status() {
                StatusCode::NO_CONTENT => return Ok(None),

                status if status.is_success() => {
                    let bytes = response.bytes().await?;
                    if bytes.is_empty() {
                        return Ok(None);
                    }

                    return Ok(Some(serde_json::from_slice(&bytes)?));
                }

                StatusCode::UNAUTHORIZED if !token_refreshed => {
                    warn!("Got 401 Unauthorized response, refreshing access token and retrying once");
                    token_refreshed = true;
                    self.authenticator.refresh_token_if_current(token.access_token()).await?;
                }

                StatusCode::UNAUTHORIZED => {
                    let body = response.text().await?;
                    let description = serde_json::from_str::<ApiErrorResponse>(&body)
                        .map(|error_response| error_response.error.message)
                        .unwrap_or(body);

                    error!("Got 401 Unauthorized response with a refreshed access token: {}", description);
                    return Err(Error::Authorization {
                        error: AuthenticationErrorKind::InvalidToken,
                        description,
                    });
                }

                StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = super::extract_retry_after(response.headers());

                    warn!(
                        "Got 429 rate-limit response from Spotify with Retry-After: {:?}",
                        retry_after
                    );

                    return Err(Error::RateLimited(retry_after));
                }

                status => {
                    let body = response.text().await?;
                    warn!("Got {} response from Spotify", status);

                    return Err(Error::Api {
                        status: status.as_u16(),
                        payload: super::parse_payload(body),
                    });
                }
            }
        }
    }

    /// Like [call](Self::call), but deserializes the response body into `T`.
    pub async fn call_json<T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        match self.call(method, path, query, body).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, &str)],
        body: Option<&Value>,
        token: &Token,
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let mut request = self
            .authenticator
            .http_client()
            .request(method, url)
            .bearer_auth(token.access_token());

        if !query.is_empty() {
            request = request.query(query);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        request.send().await
    }

    fn endpoint_url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        let path = path.strip_prefix("v1/").unwrap_or(path);

        let url = self
            .api_base_url
            .join(path)
            .map_err(|err| Error::Configuration(format!("invalid endpoint path {:?}: {}", path, err)))?;

        // the access token may only ever be sent to the API itself
        if url.origin() != self.api_base_url.origin() || !url.path().starts_with(self.api_base_url.path()) {
            return Err(Error::Configuration(format!(
                "endpoint path {:?} resolves outside the API base URL",
                path
            )));
        }

        Ok(url)
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AuthenticatorBuilder;

    fn dispatcher(api_base_url: &str) -> Dispatcher {
        let authenticator = AuthenticatorBuilder::new("test-client")
            .client_secret("test-secret")
            .build()
            .unwrap();

        Dispatcher::new(authenticator, api_base_url).unwrap()
    }

    #[test]
    fn endpoint_url_is_relative_to_base() {
        let dispatcher = dispatcher("https://api.spotify.com/v1");

        assert_eq!(
            dispatcher.endpoint_url("/me/player/currently-playing").unwrap().as_str(),
            "https://api.spotify.com/v1/me/player/currently-playing"
        );
        assert_eq!(
            dispatcher.endpoint_url("me").unwrap().as_str(),
            "https://api.spotify.com/v1/me"
        );
    }

    #[test]
    fn leading_version_segment_is_tolerated() {
        let dispatcher = dispatcher("https://api.spotify.com/v1/");

        assert_eq!(
            dispatcher.endpoint_url("/v1/tracks/abc").unwrap().as_str(),
            "https://api.spotify.com/v1/tracks/abc"
        );
    }

    #[test]
    fn paths_outside_base_are_rejected() {
        let dispatcher = dispatcher("https://api.spotify.com/v1");

        for path in [
            "http://elsewhere.example/v1/me",
            "https://api.spotify.com:8443/v1/me",
            "../me",
            "/v1/../../me",
        ] {
            assert!(
                matches!(dispatcher.endpoint_url(path), Err(Error::Configuration(_))),
                "{} was accepted",
                path
            );
        }
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let authenticator = AuthenticatorBuilder::new("test-client").build().unwrap();
        let result = Dispatcher::new(authenticator, "not a url");

        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn call_requires_login() {
        let result = dispatcher("http://127.0.0.1:9/v1")
            .call(Method::GET, "/me", &[], None)
            .await;

        assert!(matches!(result, Err(Error::NotAuthenticated)));
    }
}

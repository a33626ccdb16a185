//! The [SpotifyClient], its building blocks and their builders.
//!
//! A [SpotifyClient] is made of an [Authenticator], which runs the authorization code flow and keeps the access token
//! fresh, and a [Dispatcher], which sends authenticated requests to the Web API. Both may also be used on their own.
//!
//! ```no_run
//! # use spotifio::client::SpotifyClientBuilder;
//! # use spotifio::scope::Scope;
//! # async fn foo() -> spotifio::Result<()> {
//! let client = SpotifyClientBuilder::new("application client ID")
//!     .client_secret("application client secret")
//!     .redirect_uri("http://localhost:8888/callback")
//!     .scopes([Scope::UserReadCurrentlyPlaying])
//!     .build()?;
//!
//! let request = client.begin_login().await?;
//! // direct the user to request.url and capture the code and state from the callback
//! # let (code, state) = ("", "");
//! client.complete_login(code, state).await?;
//!
//! if let Some(currently_playing) = client.currently_playing(None).await? {
//!     println!("{}", currently_playing["item"]["name"]);
//! }
//! # Ok(())
//! # }
//! ```

mod authorization_code;
mod credentials;
mod dispatcher;
mod scoped;
mod unscoped;

pub use self::{
    authorization_code::{Authenticator, AuthenticatorBuilder, AuthorizationRequest},
    credentials::Credentials,
    dispatcher::Dispatcher,
};

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use const_format::concatcp;
use log::{debug, warn};
use reqwest::{
    header::{self, HeaderMap},
    Method, StatusCode, Url,
};
use serde_json::Value;

use crate::{
    error::{Error, Result},
    model::{error::AuthenticationErrorResponse, token::Token},
    scope::Scope,
    storage::TokenStorage,
};

const RANDOM_STATE_LENGTH: usize = 16;
const PKCE_VERIFIER_LENGTH: usize = 128; // maximum Spotify allows

const DEFAULT_REDIRECT_URI: &str = "http://localhost:8888/callback";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TRANSPORT_RETRY_BACKOFF: Duration = Duration::from_millis(500);
const TOKEN_STORAGE_NAME: &str = "spotify";

pub const API_BASE_URL: &str = "https://api.spotify.com/v1";
pub const ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";

const ACCOUNTS_AUTHORIZE_PATH: &str = "/authorize";
const ACCOUNTS_API_TOKEN_PATH: &str = "/api/token";

// scoped endpoints
const API_PLAYER_ENDPOINT: &str = "/me/player";
const API_CURRENTLY_PLAYING_ENDPOINT: &str = concatcp!(API_PLAYER_ENDPOINT, "/currently-playing");
const API_PLAYER_DEVICES_ENDPOINT: &str = concatcp!(API_PLAYER_ENDPOINT, "/devices");
const API_PLAYER_PAUSE_ENDPOINT: &str = concatcp!(API_PLAYER_ENDPOINT, "/pause");
const API_PLAYER_NEXT_ENDPOINT: &str = concatcp!(API_PLAYER_ENDPOINT, "/next");
const API_PLAYER_PREVIOUS_ENDPOINT: &str = concatcp!(API_PLAYER_ENDPOINT, "/previous");
const API_PLAYER_QUEUE_ENDPOINT: &str = concatcp!(API_PLAYER_ENDPOINT, "/queue");
const API_RECENTLY_PLAYED_ENDPOINT: &str = concatcp!(API_PLAYER_ENDPOINT, "/recently-played");
const API_CURRENT_USER_ENDPOINT: &str = "/me";

// unscoped endpoints
const API_USERS_ENDPOINT: &str = "/users";
const API_TRACKS_ENDPOINT: &str = "/tracks";
const API_SEARCH_ENDPOINT: &str = "/search";

/// A Spotify client for a single user: an [Authenticator] and a [Dispatcher] sharing one HTTP client, plus a thin
/// layer of endpoint functions on top of them.
///
/// Every endpoint function first checks the scopes the user was asked to grant and fails with a
/// [MissingScope-error](Error::MissingScope) without sending anything if a required scope wasn't requested.
///
/// This struct is cheap to clone; every clone shares the same token.
#[derive(Debug, Clone)]
pub struct SpotifyClient {
    authenticator: Authenticator,
    dispatcher: Dispatcher,
}

/// Builder for [SpotifyClient].
#[derive(Debug, Clone)]
pub struct SpotifyClientBuilder {
    authenticator: AuthenticatorBuilder,
    api_base_url: String,
}

impl SpotifyClientBuilder {
    pub fn new<S>(client_id: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            authenticator: AuthenticatorBuilder::new(client_id),
            api_base_url: API_BASE_URL.to_owned(),
        }
    }

    /// See [AuthenticatorBuilder::client_secret].
    pub fn client_secret<S>(self, client_secret: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            authenticator: self.authenticator.client_secret(client_secret),
            ..self
        }
    }

    /// See [AuthenticatorBuilder::redirect_uri].
    pub fn redirect_uri<S>(self, redirect_uri: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            authenticator: self.authenticator.redirect_uri(redirect_uri),
            ..self
        }
    }

    /// See [AuthenticatorBuilder::scopes].
    pub fn scopes<I, S>(self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scope>,
    {
        Self {
            authenticator: self.authenticator.scopes(scopes),
            ..self
        }
    }

    /// See [AuthenticatorBuilder::show_dialog].
    pub fn show_dialog(self, show_dialog: bool) -> Self {
        Self {
            authenticator: self.authenticator.show_dialog(show_dialog),
            ..self
        }
    }

    /// See [AuthenticatorBuilder::accounts_base_url].
    pub fn accounts_base_url<S>(self, accounts_base_url: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            authenticator: self.authenticator.accounts_base_url(accounts_base_url),
            ..self
        }
    }

    /// Override the base URL of the Web API. Defaults to `https://api.spotify.com/v1`.
    pub fn api_base_url<S>(self, api_base_url: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            api_base_url: api_base_url.into(),
            ..self
        }
    }

    /// Bound every HTTP request the client sends by a timeout. Defaults to 30 seconds.
    pub fn request_timeout(self, request_timeout: Duration) -> Self {
        Self {
            authenticator: self.authenticator.request_timeout(request_timeout),
            ..self
        }
    }

    /// See [AuthenticatorBuilder::token_storage].
    pub fn token_storage<T>(self, storage: T) -> Self
    where
        T: TokenStorage + 'static,
    {
        Self {
            authenticator: self.authenticator.token_storage(storage),
            ..self
        }
    }

    pub fn build(self) -> Result<SpotifyClient> {
        let authenticator = self.authenticator.build()?;
        let dispatcher = Dispatcher::new(authenticator.clone(), self.api_base_url)?;

        Ok(SpotifyClient {
            authenticator,
            dispatcher,
        })
    }
}

impl SpotifyClient {
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// See [Authenticator::begin_login].
    pub async fn begin_login(&self) -> Result<AuthorizationRequest> {
        self.authenticator.begin_login().await
    }

    /// See [Authenticator::complete_login].
    pub async fn complete_login(&self, code: &str, state: &str) -> Result<Token> {
        self.authenticator.complete_login(code, state).await
    }

    /// See [Authenticator::login_with_refresh_token].
    pub async fn login_with_refresh_token<S>(&self, refresh_token: S) -> Result<Token>
    where
        S: Into<String>,
    {
        self.authenticator.login_with_refresh_token(refresh_token).await
    }

    /// See [Dispatcher::call].
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        self.dispatcher.call(method, path, query, body).await
    }

    fn require_scopes(&self, required: &[Scope]) -> Result<()> {
        let granted = self.authenticator.credentials().scopes();
        let missing: Vec<Scope> = required
            .iter()
            .filter(|scope| !granted.iter().any(|granted| granted.as_str() == scope.as_str()))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            debug!("Endpoint requires scopes that weren't requested: {:?}", missing);
            Err(Error::MissingScope(missing))
        }
    }
}

fn build_http_client(request_timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .build()
        .map_err(|err| Error::Configuration(format!("failed to build HTTP client: {}", err)))
}

fn build_authorization_header(client_id: &str, client_secret: &str) -> String {
    let auth = format!("{}:{}", client_id, client_secret);
    format!("Basic {}", STANDARD.encode(auth))
}

/// Takes a response for an authentication request and if it's erroneous, parses its body as an authentication error.
/// On success returns the given response without modifying it.
async fn extract_authentication_error(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = extract_retry_after(response.headers());
        warn!(
            "Got 429 rate-limit response from the accounts service with Retry-After: {:?}",
            retry_after
        );

        return Err(Error::RateLimited(retry_after));
    }

    let body = response.text().await?;

    if status.is_client_error() {
        if let Ok(error_response) = serde_json::from_str::<AuthenticationErrorResponse>(&body) {
            return Err(error_response.into_error());
        }
    }

    Err(Error::Api {
        status: status.as_u16(),
        payload: parse_payload(body),
    })
}

/// Returns the seconds in a 429 response's `Retry-After` header, if it has a valid one.
fn extract_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

/// Appends an ID to an endpoint path as a single percent-encoded path segment.
fn resource_path(endpoint: &str, id: &str) -> Result<String> {
    if id.is_empty() || id == "." || id == ".." {
        return Err(Error::Configuration(format!("{:?} is not a valid ID", id)));
    }

    // only the path of this URL is used
    let mut url = Url::parse("http://localhost/")
        .map_err(|err| Error::Configuration(format!("failed to build resource path: {}", err)))?;

    url.path_segments_mut()
        .map_err(|_| Error::Configuration("failed to build resource path".to_owned()))?
        .extend(endpoint.split('/').filter(|segment| !segment.is_empty()))
        .push(id);

    Ok(url.path().to_owned())
}

/// Parses an error response body as JSON, falling back to the raw text.
fn parse_payload(body: String) -> Value {
    serde_json::from_str(&body).unwrap_or_else(|_| Value::String(body))
}

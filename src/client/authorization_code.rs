//! Contains the [Authenticator] and its builder. The authenticator implements the authorization code flow with
//! optional PKCE and keeps the resulting access token fresh.
//!
//! [Spotify documentation on the authorization code flow.](https://developer.spotify.com/documentation/general/guides/authorization/code-flow/).
//!
//! # Usage
//!
//! ```no_run
//! # use spotifio::client::AuthenticatorBuilder;
//! # use spotifio::scope::Scope;
//! # async fn foo() -> spotifio::Result<()> {
//! let authenticator = AuthenticatorBuilder::new("application client ID")
//!     .client_secret("application client secret")
//!     // the callback URL here should match one of the callback URLs
//!     // specified in your Spotify application
//!     .redirect_uri("http://localhost:8888/callback")
//!     .scopes([Scope::UserReadCurrentlyPlaying])
//!     .build()?;
//!
//! // direct the user to this URL in some manner
//! let request = authenticator.begin_login().await?;
//! println!("{}", request.url);
//!
//! // when the user accepts, they are redirected to the callback URL with a
//! // `code` and a `state` in the query parameters. capturing them is up to
//! // the application
//! # let code = "";
//! # let state = "";
//! authenticator.complete_login(code, state).await?;
//!
//! // from here on, current_token() always hands out a usable access token,
//! // refreshing it when needed
//! let token = authenticator.current_token().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Refreshing
//!
//! Refreshing is single-flight: when several tasks find the access token expired at the same time, only one refresh
//! request is sent and every task receives its result. The refresh runs on its own task, so a caller that stops
//! waiting (e.g. due to a timeout) does not cancel a refresh other callers are waiting on.

use std::{fmt, sync::Arc, time::Duration};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use log::{debug, error, warn};
use rand::{distributions::Alphanumeric, Rng};
use reqwest::{header, Url};
use sha2::Digest;
use tokio::sync::Mutex;

use super::{
    credentials::Credentials, ACCOUNTS_API_TOKEN_PATH, ACCOUNTS_AUTHORIZE_PATH, ACCOUNTS_BASE_URL,
    DEFAULT_REDIRECT_URI, DEFAULT_REQUEST_TIMEOUT, PKCE_VERIFIER_LENGTH, RANDOM_STATE_LENGTH, TOKEN_STORAGE_NAME,
};
use crate::{
    error::{Error, Result},
    model::token::{Token, TokenResponse},
    scope::{Scope, ToScopesString},
    storage::TokenStorage,
};

/// Manages the OAuth2 authorization code lifecycle of a single user and hands out valid access tokens.
///
/// This struct uses `Arc` and interior mutability internally, so it is cheap to clone and every clone shares the same
/// token. You do not need to wrap it in an `Arc` or a `Mutex` in order to reuse it.
#[derive(Debug, Clone)]
pub struct Authenticator {
    inner: Arc<AuthenticatorRef>,
    http_client: reqwest::Client,
}

struct AuthenticatorRef {
    credentials: Credentials,
    accounts_base_url: String,
    show_dialog: bool,
    storage: Option<Arc<dyn TokenStorage>>,
    state: Mutex<AuthorizationState>,
}

enum AuthorizationState {
    Unauthenticated,
    AwaitingRedirect {
        state: String,
        pkce_verifier: Option<String>,
    },
    Authenticated(Token),
}

/// An authorization URL the user should be directed to, and the state nonce bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Builder for [Authenticator].
#[derive(Clone)]
pub struct AuthenticatorBuilder {
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
    scopes: Vec<Scope>,
    show_dialog: bool,
    accounts_base_url: String,
    request_timeout: Duration,
    storage: Option<Arc<dyn TokenStorage>>,
    http_client: Option<reqwest::Client>,
}

impl AuthenticatorBuilder {
    pub fn new<S>(client_id: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_owned(),
            scopes: Vec::new(),
            show_dialog: false,
            accounts_base_url: ACCOUNTS_BASE_URL.to_owned(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            storage: None,
            http_client: None,
        }
    }

    /// Authenticate the application with its client secret. Without one, the PKCE extension is used instead.
    pub fn client_secret<S>(self, client_secret: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            client_secret: Some(client_secret.into()),
            ..self
        }
    }

    /// The URL Spotify redirects the user to after they approve the application. Defaults to
    /// `http://localhost:8888/callback`.
    pub fn redirect_uri<S>(self, redirect_uri: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            redirect_uri: redirect_uri.into(),
            ..self
        }
    }

    /// Specify the [OAuth authorization scopes](crate::scope::Scope) that the user is asked to grant for the
    /// application.
    pub fn scopes<I, S>(self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scope>,
    {
        Self {
            scopes: scopes.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    /// Set whether or not to force the user to approve the application again, if they've already done so.
    pub fn show_dialog(self, show_dialog: bool) -> Self {
        Self { show_dialog, ..self }
    }

    /// Override the base URL of the Spotify accounts service.
    pub fn accounts_base_url<S>(self, accounts_base_url: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            accounts_base_url: accounts_base_url.into(),
            ..self
        }
    }

    /// Bound every request to the accounts service by a timeout. Defaults to 30 seconds. Ignored if an HTTP client is
    /// supplied with [`http_client`](Self::http_client).
    pub fn request_timeout(self, request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            ..self
        }
    }

    /// Save every newly issued token into the given storage.
    ///
    /// A token is saved after the authenticator has started using it. If saving fails, the operation that issued the
    /// token returns a [Storage-error](Error::Storage) but the authenticator stays authenticated with the new token.
    pub fn token_storage<T>(self, storage: T) -> Self
    where
        T: TokenStorage + 'static,
    {
        Self {
            storage: Some(Arc::new(storage)),
            ..self
        }
    }

    /// Use an existing HTTP client instead of building a new one.
    pub fn http_client(self, http_client: reqwest::Client) -> Self {
        Self {
            http_client: Some(http_client),
            ..self
        }
    }

    /// Validate the configuration and build the [Authenticator].
    pub fn build(self) -> Result<Authenticator> {
        let credentials = Credentials::new(self.client_id, self.client_secret, self.redirect_uri, self.scopes)?;

        if let Err(err) = Url::parse(&self.accounts_base_url) {
            return Err(Error::Configuration(format!(
                "the accounts base URL {:?} is invalid: {}",
                self.accounts_base_url, err
            )));
        }

        let http_client = match self.http_client {
            Some(http_client) => http_client,
            None => super::build_http_client(self.request_timeout)?,
        };

        debug!("Built authenticator with {:?}", credentials);

        Ok(Authenticator {
            inner: Arc::new(AuthenticatorRef {
                credentials,
                accounts_base_url: self.accounts_base_url.trim_end_matches('/').to_owned(),
                show_dialog: self.show_dialog,
                storage: self.storage,
                state: Mutex::new(AuthorizationState::Unauthenticated),
            }),
            http_client,
        })
    }
}

impl Authenticator {
    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Returns whether the authenticator currently holds a token. The token may still be expired.
    pub async fn is_authenticated(&self) -> bool {
        matches!(*self.inner.state.lock().await, AuthorizationState::Authenticated(_))
    }

    /// Returns a copy of the held token without refreshing it, e.g. to persist it.
    pub async fn token(&self) -> Option<Token> {
        match &*self.inner.state.lock().await {
            AuthorizationState::Authenticated(token) => Some(token.clone()),
            _ => None,
        }
    }

    /// Begin a login by generating a new state nonce and building the authorization URL the user should be directed
    /// to.
    ///
    /// Calling this again replaces any login in progress or any held token; only the newest nonce is accepted by
    /// [`complete_login`](Self::complete_login).
    pub async fn begin_login(&self) -> Result<AuthorizationRequest> {
        let credentials = &self.inner.credentials;
        let state = random_alphanumeric(RANDOM_STATE_LENGTH);
        let pkce_verifier = credentials.uses_pkce().then(|| random_alphanumeric(PKCE_VERIFIER_LENGTH));
        let scopes = credentials.scopes().iter().to_scopes_string();

        let mut query_params = vec![
            ("response_type", "code".to_owned()),
            ("client_id", credentials.client_id().to_owned()),
            ("redirect_uri", credentials.redirect_uri().to_owned()),
            ("state", state.clone()),
        ];

        if !scopes.is_empty() {
            query_params.push(("scope", scopes));
        }

        if self.inner.show_dialog {
            query_params.push(("show_dialog", "true".to_owned()));
        }

        if let Some(pkce_verifier) = pkce_verifier.as_deref() {
            debug!("Using PKCE extension for the authorization code flow");
            query_params.push(("code_challenge_method", "S256".to_owned()));
            query_params.push(("code_challenge", pkce_challenge(pkce_verifier)));
        }

        let url = Url::parse_with_params(&self.authorize_endpoint(), &query_params)
            .map_err(|err| Error::Configuration(format!("failed to build authorize URL: {}", err)))?;

        let mut current = self.inner.state.lock().await;
        if matches!(*current, AuthorizationState::Authenticated(_)) {
            warn!("Beginning a new login while authenticated, dropping the held token");
        }

        *current = AuthorizationState::AwaitingRedirect {
            state: state.clone(),
            pkce_verifier,
        };

        debug!("Awaiting authorization redirect");

        Ok(AuthorizationRequest {
            url: url.into(),
            state,
        })
    }

    /// Complete a login with a code and a state from the callback URL query the user was redirected to after they
    /// approved the application.
    ///
    /// If the state does not match the one generated by [`begin_login`](Self::begin_login), this function returns a
    /// [StateMismatch-error](Error::StateMismatch) and the login in progress is left untouched. Otherwise the code is
    /// exchanged for an access and a refresh token.
    ///
    /// If a [TokenStorage] is configured and saving the new token fails, this function returns a
    /// [Storage-error](Error::Storage) even though the login itself succeeded.
    pub async fn complete_login(&self, code: &str, state: &str) -> Result<Token> {
        let pkce_verifier = {
            let mut current = self.inner.state.lock().await;

            match std::mem::replace(&mut *current, AuthorizationState::Unauthenticated) {
                AuthorizationState::AwaitingRedirect {
                    state: expected,
                    pkce_verifier,
                } if expected == state => pkce_verifier,

                previous => {
                    warn!("Callback state does not match the state of the login in progress");
                    *current = previous;
                    return Err(Error::StateMismatch);
                }
            }
        };

        let credentials = &self.inner.credentials;
        let mut token_request_form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", credentials.redirect_uri()),
        ];

        if let Some(pkce_verifier) = pkce_verifier.as_deref() {
            debug!("Requesting access and refresh tokens for authorization code flow with PKCE");
            token_request_form.extend([("client_id", credentials.client_id()), ("code_verifier", pkce_verifier)]);
        } else {
            debug!("Requesting access and refresh tokens for authorization code flow");
        }

        let token_response = self.request_token(&token_request_form).await?;
        let token = Token::from_response(token_response, None)?;

        *self.inner.state.lock().await = AuthorizationState::Authenticated(token.clone());
        self.save_token(&token).await?;

        Ok(token)
    }

    /// Authenticate with a refresh token from a previous session by immediately exchanging it for a new access token.
    pub async fn login_with_refresh_token<S>(&self, refresh_token: S) -> Result<Token>
    where
        S: Into<String>,
    {
        let refresh_token = refresh_token.into();
        debug!("Logging in with an existing refresh token");

        let mut current = self.inner.state.lock().await;
        let token = self.request_refreshed_token(refresh_token).await?;
        *current = AuthorizationState::Authenticated(token.clone());
        drop(current);

        self.save_token(&token).await?;
        Ok(token)
    }

    /// Authenticate with a previously issued token. If it has expired, it is refreshed on next use.
    pub async fn restore_token(&self, token: Token) {
        debug!("Restoring token that expires at {:?}", token.expires_at());
        *self.inner.state.lock().await = AuthorizationState::Authenticated(token);
    }

    /// Restore the token saved in the configured [TokenStorage]. Returns `None` if no storage is configured or it
    /// has no token.
    pub async fn load_stored_token(&self) -> Result<Option<Token>> {
        let Some(storage) = &self.inner.storage else {
            return Ok(None);
        };

        debug!("Attempting to load saved token");
        let token = storage.load_token(TOKEN_STORAGE_NAME).await?;

        if let Some(token) = &token {
            self.restore_token(token.clone()).await;
        }

        Ok(token)
    }

    /// Forget the held token and any login in progress.
    pub async fn logout(&self) {
        *self.inner.state.lock().await = AuthorizationState::Unauthenticated;
    }

    /// Returns a valid access token, refreshing it first if it has expired.
    ///
    /// If the refresh token has been revoked or has expired, the authenticator becomes unauthenticated and this
    /// function returns a [ReauthenticationRequired-error](Error::ReauthenticationRequired). A failure to save a
    /// refreshed token into the configured [TokenStorage] is returned as a [Storage-error](Error::Storage); the
    /// refreshed token stays in use.
    pub async fn current_token(&self) -> Result<Token> {
        let stale_access_token = match &*self.inner.state.lock().await {
            AuthorizationState::Authenticated(token) if !token.is_expired() => return Ok(token.clone()),
            AuthorizationState::Authenticated(token) => token.access_token().to_owned(),
            _ => return Err(Error::NotAuthenticated),
        };

        debug!("Access token expired, refreshing");
        self.refresh_shared(stale_access_token).await
    }

    /// Refresh the access token unless it has already been replaced since `stale_access_token` was handed out.
    ///
    /// Used when Spotify rejects an access token before its expiry time.
    pub async fn refresh_token_if_current(&self, stale_access_token: &str) -> Result<Token> {
        self.refresh_shared(stale_access_token.to_owned()).await
    }

    async fn refresh_shared(&self, stale_access_token: String) -> Result<Token> {
        let authenticator = self.clone();
        let refresh = tokio::spawn(async move { authenticator.refresh_locked(&stale_access_token).await });

        match refresh.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => Err(Error::RefreshAborted),
        }
    }

    async fn refresh_locked(&self, stale_access_token: &str) -> Result<Token> {
        // the state lock is held for the entire refresh so concurrent callers wait for this refresh instead of
        // starting their own
        let mut current = self.inner.state.lock().await;

        let refresh_token = match &*current {
            AuthorizationState::Authenticated(token) if token.access_token() != stale_access_token => {
                debug!("Access token was already refreshed by a concurrent caller");
                return Ok(token.clone());
            }

            AuthorizationState::Authenticated(token) => token.refresh_token().map(str::to_owned),

            // logged out, or a concurrent refresh was rejected, while this caller waited
            _ => return Err(Error::NotAuthenticated),
        };

        let Some(refresh_token) = refresh_token else {
            warn!("Access token expired and there is no refresh token to refresh it with");
            *current = AuthorizationState::Unauthenticated;
            return Err(Error::ReauthenticationRequired("no refresh token available".to_owned()));
        };

        match self.request_refreshed_token(refresh_token).await {
            Ok(token) => {
                *current = AuthorizationState::Authenticated(token.clone());
                drop(current);

                self.save_token(&token).await?;
                Ok(token)
            }

            Err(Error::Authorization { error, description }) => {
                error!("Refreshing the access token failed: {}: {}", error, description);
                *current = AuthorizationState::Unauthenticated;
                Err(Error::ReauthenticationRequired(description))
            }

            Err(err) => Err(err),
        }
    }

    async fn request_refreshed_token(&self, refresh_token: String) -> Result<Token> {
        let credentials = &self.inner.credentials;
        let mut token_request_form = vec![("grant_type", "refresh_token"), ("refresh_token", refresh_token.as_str())];

        if credentials.uses_pkce() {
            token_request_form.push(("client_id", credentials.client_id()));
        }

        let token_response = self.request_token(&token_request_form).await?;
        debug!(
            "Got refreshed access token that expires in {} seconds (new refresh token: {})",
            token_response.expires_in(),
            token_response.has_refresh_token()
        );

        Token::from_response(token_response, Some(refresh_token))
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let credentials = &self.inner.credentials;
        let mut request = self.http_client.post(self.token_endpoint()).form(form);

        if let Some(client_secret) = credentials.client_secret() {
            request = request.header(
                header::AUTHORIZATION,
                super::build_authorization_header(credentials.client_id(), client_secret),
            );
        }

        let response = request.send().await?;
        let response = super::extract_authentication_error(response).await?;
        let token_response: TokenResponse = response.json().await?;

        debug!(
            "Got token response for authorization code flow, expires in {} seconds",
            token_response.expires_in()
        );

        Ok(token_response)
    }

    async fn save_token(&self, token: &Token) -> Result<()> {
        if let Some(storage) = &self.inner.storage {
            storage.save_token(TOKEN_STORAGE_NAME, token).await?;
        }

        Ok(())
    }

    fn authorize_endpoint(&self) -> String {
        format!("{}{}", self.inner.accounts_base_url, ACCOUNTS_AUTHORIZE_PATH)
    }

    fn token_endpoint(&self) -> String {
        format!("{}{}", self.inner.accounts_base_url, ACCOUNTS_API_TOKEN_PATH)
    }
}

impl fmt::Debug for AuthenticatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatorRef")
            .field("credentials", &self.credentials)
            .field("accounts_base_url", &self.accounts_base_url)
            .field("show_dialog", &self.show_dialog)
            .field("storage", &self.storage.is_some())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for AuthenticatorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatorBuilder")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("show_dialog", &self.show_dialog)
            .field("accounts_base_url", &self.accounts_base_url)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

fn random_alphanumeric(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

fn pkce_challenge(pkce_verifier: &str) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(pkce_verifier);
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

//! A fake Spotify accounts service and Web API listening on a random local port.

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::{Duration, SystemTime},
};

use axum::{
    extract::{Form, State},
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, post},
    Json, Router,
};
use serde_json::{json, Value};
use spotifio::{
    client::{AuthenticatorBuilder, SpotifyClient, SpotifyClientBuilder},
    model::token::Token,
    Scope,
};

pub const VALID_CODE: &str = "validcode";

/// A response the fake Web API returns for the next request it receives.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    status: StatusCode,
    retry_after: Option<u64>,
    body: Option<Value>,
}

impl ScriptedResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status: status_code(status),
            retry_after: None,
            body: Some(body),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status: status_code(status),
            retry_after: None,
            body: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self::json(401, json!({ "error": { "status": 401, "message": "The access token expired" } }))
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::json(429, json!({ "error": { "status": 429, "message": "API rate limit exceeded" } }))
        }
    }
}

#[derive(Default)]
struct ProviderState {
    token_requests: AtomicUsize,
    refresh_requests: AtomicUsize,
    api_requests: AtomicUsize,
    reject_refresh: AtomicBool,
    token_rate_limit: Mutex<Option<u64>>,
    last_token_form: Mutex<Option<HashMap<String, String>>>,
    last_token_authorization: Mutex<Option<String>>,
    refresh_delay: Mutex<Duration>,
    responses: Mutex<VecDeque<ScriptedResponse>>,
    last_authorization: Mutex<Option<String>>,
    last_request: Mutex<Option<String>>,
}

pub struct FakeSpotify {
    base_url: String,
    state: Arc<ProviderState>,
}

impl FakeSpotify {
    pub async fn start() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let state = Arc::new(ProviderState::default());
        let app = Router::new()
            .route("/api/token", post(token))
            .route("/v1/{*path}", any(api))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, state }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn authenticator_builder(&self) -> AuthenticatorBuilder {
        AuthenticatorBuilder::new("test-client")
            .client_secret("test-secret")
            .accounts_base_url(&self.base_url)
    }

    pub fn client<I>(&self, scopes: I) -> SpotifyClient
    where
        I: IntoIterator<Item = Scope>,
    {
        SpotifyClientBuilder::new("test-client")
            .client_secret("test-secret")
            .scopes(scopes)
            .accounts_base_url(&self.base_url)
            .api_base_url(format!("{}/v1", self.base_url))
            .build()
            .unwrap()
    }

    pub fn push_response(&self, response: ScriptedResponse) {
        self.state.responses.lock().unwrap().push_back(response);
    }

    pub fn reject_refresh(&self) {
        self.state.reject_refresh.store(true, Ordering::SeqCst);
    }

    pub fn rate_limit_token_requests(&self, retry_after: u64) {
        *self.state.token_rate_limit.lock().unwrap() = Some(retry_after);
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.state.refresh_delay.lock().unwrap() = delay;
    }

    pub fn token_requests(&self) -> usize {
        self.state.token_requests.load(Ordering::SeqCst)
    }

    pub fn refresh_requests(&self) -> usize {
        self.state.refresh_requests.load(Ordering::SeqCst)
    }

    pub fn api_requests(&self) -> usize {
        self.state.api_requests.load(Ordering::SeqCst)
    }

    pub fn last_token_form(&self) -> Option<HashMap<String, String>> {
        self.state.last_token_form.lock().unwrap().clone()
    }

    pub fn last_token_authorization(&self) -> Option<String> {
        self.state.last_token_authorization.lock().unwrap().clone()
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.state.last_authorization.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<String> {
        self.state.last_request.lock().unwrap().clone()
    }
}

pub fn valid_token() -> Token {
    Token::new("abc", Some("xyz".to_owned()), SystemTime::now() + Duration::from_secs(3600))
}

pub fn expired_token() -> Token {
    Token::new("old", Some("xyz".to_owned()), SystemTime::now() - Duration::from_secs(60))
}

async fn token(
    State(state): State<Arc<ProviderState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.token_requests.fetch_add(1, Ordering::SeqCst);
    *state.last_token_form.lock().unwrap() = Some(form.clone());
    *state.last_token_authorization.lock().unwrap() = authorization(&headers);

    let rate_limit = *state.token_rate_limit.lock().unwrap();
    if let Some(retry_after) = rate_limit {
        let mut response = StatusCode::TOO_MANY_REQUESTS.into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));

        return response;
    }

    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") if form.get("code").map(String::as_str) == Some(VALID_CODE) => Json(json!({
            "access_token": "abc",
            "token_type": "Bearer",
            "scope": "user-read-currently-playing",
            "expires_in": 3600,
            "refresh_token": "xyz",
        }))
        .into_response(),

        Some("authorization_code") => invalid_grant("Invalid authorization code"),

        Some("refresh_token") => {
            let count = state.refresh_requests.fetch_add(1, Ordering::SeqCst) + 1;

            let delay = *state.refresh_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            if state.reject_refresh.load(Ordering::SeqCst) {
                return invalid_grant("Refresh token revoked");
            }

            // no refresh token; the client keeps the previous one
            Json(json!({
                "access_token": format!("refreshed-{}", count),
                "token_type": "Bearer",
                "expires_in": 3600,
            }))
            .into_response()
        }

        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "unsupported_grant_type", "error_description": "grant_type must be set" })),
        )
            .into_response(),
    }
}

async fn api(State(state): State<Arc<ProviderState>>, headers: HeaderMap, uri: Uri) -> Response {
    state.api_requests.fetch_add(1, Ordering::SeqCst);
    *state.last_request.lock().unwrap() = Some(uri.to_string());
    *state.last_authorization.lock().unwrap() = authorization(&headers);

    let scripted = state.responses.lock().unwrap().pop_front();
    let Some(scripted) = scripted else {
        return Json(json!({ "ok": true })).into_response();
    };

    let mut response = match scripted.body {
        Some(body) => (scripted.status, Json(body)).into_response(),
        None => scripted.status.into_response(),
    };

    if let Some(retry_after) = scripted.retry_after {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    }

    response
}

/// Listens on a random local port, accepting and immediately dropping every connection. Returns the base URL and the
/// number of connections accepted so far.
pub async fn start_dropping_listener() -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let connections = Arc::new(AtomicUsize::new(0));

    let accepted = Arc::clone(&connections);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            accepted.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    (base_url, connections)
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

fn invalid_grant(description: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "invalid_grant", "error_description": description })),
    )
        .into_response()
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap()
}

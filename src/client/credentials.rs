use std::fmt;

use reqwest::Url;

use crate::{
    error::{Error, Result},
    scope::Scope,
};

/// The application's credentials and the scopes it requests from the user. Validated when constructed and immutable
/// afterwards.
///
/// Without a client secret, the authorization code flow uses the PKCE extension instead of client authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
    scopes: Vec<Scope>,
}

impl Credentials {
    pub fn new<I, S>(
        client_id: impl Into<String>,
        client_secret: Option<String>,
        redirect_uri: impl Into<String>,
        scopes: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Scope>,
    {
        let client_id = client_id.into();
        let redirect_uri = redirect_uri.into();

        if client_id.trim().is_empty() {
            return Err(Error::Configuration("the client ID is empty".to_owned()));
        }

        if client_secret.as_deref().is_some_and(|secret| secret.trim().is_empty()) {
            return Err(Error::Configuration("the client secret is empty".to_owned()));
        }

        if let Err(err) = Url::parse(&redirect_uri) {
            return Err(Error::Configuration(format!(
                "the redirect URI {:?} is invalid: {}",
                redirect_uri, err
            )));
        }

        let mut deduplicated: Vec<Scope> = Vec::new();
        for scope in scopes.into_iter().map(Into::<Scope>::into) {
            // a known scope given as Other becomes its own variant
            let scope = Scope::from(scope.as_str());
            let scope_str = scope.as_str();
            if scope_str.is_empty() || scope_str.contains(char::is_whitespace) {
                return Err(Error::Configuration(format!("the scope {:?} is invalid", scope_str)));
            }

            if !deduplicated.contains(&scope) {
                deduplicated.push(scope);
            }
        }

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
            scopes: deduplicated,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Returns whether the credentials lack a client secret, in which case PKCE is used.
    pub fn uses_pkce(&self) -> bool {
        self.client_secret.is_none()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

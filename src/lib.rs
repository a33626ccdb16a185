//! An asynchronous Spotify Web API client for a single user.
//!
//! The [Authenticator](client::Authenticator) runs the OAuth2 authorization code flow and keeps the user's access
//! token fresh. The [Dispatcher](client::Dispatcher) sends authenticated requests and maps Spotify's responses into
//! [errors](Error). The [SpotifyClient](client::SpotifyClient) bundles the two with a set of endpoint functions.
//!
//! ```no_run
//! # use spotifio::{client::SpotifyClientBuilder, storage::JsonFileStorage, Scope};
//! # async fn foo() -> spotifio::Result<()> {
//! let client = SpotifyClientBuilder::new("application client ID")
//!     .client_secret("application client secret")
//!     .scopes([Scope::UserReadPlaybackState, Scope::UserModifyPlaybackState])
//!     .token_storage(JsonFileStorage::new("db"))
//!     .build()?;
//!
//! if client.authenticator().load_stored_token().await?.is_none() {
//!     let request = client.begin_login().await?;
//!     println!("Login here: {}", request.url);
//!     // capture the code and state from the redirect
//! #   let (code, state) = ("", "");
//!     client.complete_login(code, state).await?;
//! }
//!
//! client.pause(None).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod model;
pub mod scope;
pub mod storage;

mod util;

pub use crate::{
    error::{Error, Result},
    scope::Scope,
};

/// Re-exports of the types most applications need.
pub mod prelude {
    pub use crate::{
        client::{Authenticator, AuthenticatorBuilder, Dispatcher, SpotifyClient, SpotifyClientBuilder},
        model::token::Token,
        scope::Scope,
        storage::{JsonFileStorage, MemoryStorage, TokenStorage},
    };
}

//! Optional token persistence.
//!
//! By default an [Authenticator](crate::client::Authenticator) keeps its token only in memory. Configuring a
//! [TokenStorage] makes it save every newly issued token, which can later be restored with
//! [`load_stored_token`](crate::client::Authenticator::load_stored_token).

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::Mutex;

use crate::{error::Result, model::token::Token};

#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Save a token under the given name, replacing any previous one.
    async fn save_token(&self, name: &str, token: &Token) -> Result<()>;

    /// Load a previously saved token. Returns `None` if there is no token saved under the name.
    async fn load_token(&self, name: &str) -> Result<Option<Token>>;
}

/// Keeps tokens in memory. Mostly useful for sharing a token between several clients in the same process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tokens: Mutex<HashMap<String, Token>>,
}

/// Saves each token as a pretty-printed JSON file named `<name>_token.json` in a directory.
///
/// The directory is created when the first token is saved.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    directory: PathBuf,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JsonFileStorage {
    pub fn new<P>(directory: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn token_path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{}_token.json", name))
    }
}

#[async_trait]
impl TokenStorage for MemoryStorage {
    async fn save_token(&self, name: &str, token: &Token) -> Result<()> {
        self.tokens.lock().await.insert(name.to_owned(), token.clone());
        Ok(())
    }

    async fn load_token(&self, name: &str) -> Result<Option<Token>> {
        Ok(self.tokens.lock().await.get(name).cloned())
    }
}

#[async_trait]
impl TokenStorage for JsonFileStorage {
    async fn save_token(&self, name: &str, token: &Token) -> Result<()> {
        let path = self.token_path(name);
        debug!("Saving token to {}", path.display());

        let contents = serde_json::to_string_pretty(token).map_err(io::Error::from)?;
        tokio::fs::create_dir_all(&self.directory).await?;
        tokio::fs::write(&path, contents).await?;

        Ok(())
    }

    async fn load_token(&self, name: &str) -> Result<Option<Token>> {
        let path = self.token_path(name);

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                debug!("Loaded token from {}", path.display());
                Ok(Some(serde_json::from_str(&contents).map_err(io::Error::from)?))
            }

            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("No token at: {}", path.display());
                Ok(None)
            }

            Err(err) => Err(err.into()),
        }
    }
}

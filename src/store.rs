//! Token persistence, keyed by import source.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::{AccessToken, DataImportSource, TokenError};

/// Persistent storage capability the token manager depends on.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    async fn get_oauth_access_token(
        &self,
        source: DataImportSource,
    ) -> Result<Option<AccessToken>, TokenError>;

    async fn save_oauth_access_token(
        &self,
        source: DataImportSource,
        token: &AccessToken,
    ) -> Result<(), TokenError>;
}

/// Thin bridge between the manager and a [`TokenStorage`] backend.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn TokenStorage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self { storage }
    }

    pub async fn get(&self, source: DataImportSource) -> Result<Option<AccessToken>, TokenError> {
        self.storage.get_oauth_access_token(source).await
    }

    pub async fn put(
        &self,
        source: DataImportSource,
        token: &AccessToken,
    ) -> Result<(), TokenError> {
        self.storage.save_oauth_access_token(source, token).await
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    tokens: RwLock<HashMap<DataImportSource, AccessToken>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStorage for MemoryTokenStorage {
    async fn get_oauth_access_token(
        &self,
        source: DataImportSource,
    ) -> Result<Option<AccessToken>, TokenError> {
        Ok(self.tokens.read().await.get(&source).cloned())
    }

    async fn save_oauth_access_token(
        &self,
        source: DataImportSource,
        token: &AccessToken,
    ) -> Result<(), TokenError> {
        self.tokens.write().await.insert(source, token.clone());
        Ok(())
    }
}

/// Stores all tokens in one JSON object keyed by source name.
#[derive(Debug)]
pub struct FileTokenStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<BTreeMap<DataImportSource, AccessToken>, TokenError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl TokenStorage for FileTokenStorage {
    async fn get_oauth_access_token(
        &self,
        source: DataImportSource,
    ) -> Result<Option<AccessToken>, TokenError> {
        Ok(self.load().await?.remove(&source))
    }

    async fn save_oauth_access_token(
        &self,
        source: DataImportSource,
        token: &AccessToken,
    ) -> Result<(), TokenError> {
        let _guard = self.write_lock.lock().await;
        let mut tokens = self.load().await?;
        tokens.insert(source, token.clone());

        let encoded = serde_json::to_vec_pretty(&tokens)?;
        let staging = self.path.with_extension("tmp");
        tokio::fs::write(&staging, encoded).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

//! Token storage shared by the client and persisted between CLI runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::api::types::TokenPair;
use crate::error::Result;

/// Holds the JWT pair for the current login. Cloning shares the store.
#[derive(Debug, Clone, Default)]
pub struct Session {
    tokens: Arc<RwLock<Option<TokenPair>>>,
    file: Option<PathBuf>,
}

impl Session {
    /// Session that lives only for the process, used in tests.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Session backed by a JSON file. Loads any stored pair up front;
    /// a missing or unreadable file just means "not logged in".
    pub async fn with_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let tokens = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<TokenPair>(&bytes) {
                Ok(pair) => {
                    debug!(file = %path.display(), "loaded stored session");
                    Some(pair)
                }
                Err(err) => {
                    warn!(file = %path.display(), %err, "ignoring malformed session file");
                    None
                }
            },
            Err(_) => None,
        };
        Self {
            tokens: Arc::new(RwLock::new(tokens)),
            file: Some(path),
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.tokens.read().await.is_some()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.tokens.read().await.as_ref().map(|t| t.access.clone())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.tokens.read().await.as_ref().map(|t| t.refresh.clone())
    }

    pub async fn set(&self, pair: TokenPair) -> Result<()> {
        *self.tokens.write().await = Some(pair);
        self.persist().await
    }

    /// Swap in a new access token after a refresh, keeping the refresh token.
    pub async fn update_access(&self, access: String) -> Result<()> {
        if let Some(pair) = self.tokens.write().await.as_mut() {
            pair.access = access;
        }
        self.persist().await
    }

    /// Drop the tokens and remove the session file.
    pub async fn clear(&self) {
        *self.tokens.write().await = None;
        if let Some(file) = &self.file {
            let _ = tokio::fs::remove_file(file).await;
        }
    }

    async fn persist(&self) -> Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        let guard = self.tokens.read().await;
        if let Some(pair) = guard.as_ref() {
            let bytes = serde_json::to_vec_pretty(pair)?;
            tokio::fs::write(file, bytes).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> TokenPair {
        TokenPair {
            access: "acc".into(),
            refresh: "ref".into(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_lifecycle() {
        let session = Session::in_memory();
        assert!(!session.is_authenticated().await);
        session.set(pair()).await.unwrap();
        assert_eq!(session.access_token().await.as_deref(), Some("acc"));
        session.update_access("acc2".into()).await.unwrap();
        assert_eq!(session.access_token().await.as_deref(), Some("acc2"));
        assert_eq!(session.refresh_token().await.as_deref(), Some("ref"));
        session.clear().await;
        assert!(!session.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("prosumer-session-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let file = dir.join("session.json");

        let session = Session::with_file(&file).await;
        assert!(!session.is_authenticated().await);
        session.set(pair()).await.unwrap();

        let reloaded = Session::with_file(&file).await;
        assert_eq!(reloaded.access_token().await.as_deref(), Some("acc"));

        reloaded.clear().await;
        let gone = Session::with_file(&file).await;
        assert!(!gone.is_authenticated().await);

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}

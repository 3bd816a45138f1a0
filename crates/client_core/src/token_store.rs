use anyhow::Result;
use async_trait::async_trait;
use storage::Storage;
use tokio::sync::Mutex;

/// Fixed key of the only value the client persists.
pub const TOKEN_STORAGE_KEY: &str = "token";

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> Result<Option<String>>;
    async fn save(&self, token: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Token persisted in the SQLite client state so it survives restarts.
pub struct DurableTokenStore {
    store: Storage,
}

impl DurableTokenStore {
    pub fn new(store: Storage) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TokenStore for DurableTokenStore {
    async fn load(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .load_value(TOKEN_STORAGE_KEY)
            .await?
            .filter(|token| !token.trim().is_empty()))
    }

    async fn save(&self, token: &str) -> Result<()> {
        self.store.save_value(TOKEN_STORAGE_KEY, token).await
    }

    async fn clear(&self) -> Result<()> {
        self.store.remove_value(TOKEN_STORAGE_KEY).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    pub async fn current(&self) -> Option<String> {
        self.token.lock().await.clone()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<String>> {
        Ok(self.token.lock().await.clone())
    }

    async fn save(&self, token: &str) -> Result<()> {
        *self.token.lock().await = Some(token.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.token.lock().await = None;
        Ok(())
    }
}

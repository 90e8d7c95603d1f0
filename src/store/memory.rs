use super::{TokenStore, Tokens};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Token store that lives only as long as the process.
#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    inner: Arc<Mutex<Option<Tokens>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: Tokens) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(tokens))),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<Tokens>> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save(&self, tokens: &Tokens) -> Result<()> {
        debug!("Storing tokens in memory");
        *self.inner.lock().await = Some(tokens.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        debug!("Clearing in-memory tokens");
        *self.inner.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = MemoryTokenStore::new();
        assert!(store.load().await.unwrap().is_none());

        let tokens = Tokens {
            access: "a1".to_string(),
            refresh: Some("r1".to_string()),
        };
        store.save(&tokens).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(tokens));

        store.update_access("a2").await.unwrap();
        let updated = store.load().await.unwrap().unwrap();
        assert_eq!(updated.access, "a2");
        assert_eq!(updated.refresh.as_deref(), Some("r1"));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }
}

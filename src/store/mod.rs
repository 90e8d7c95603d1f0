//! Persistence of the session tokens between invocations.
pub mod disk;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use disk::FileTokenStore;
pub use memory::MemoryTokenStore;

/// Bearer token and optional refresh token of a logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> Result<Option<Tokens>>;
    async fn save(&self, tokens: &Tokens) -> Result<()>;
    async fn clear(&self) -> Result<()>;

    /// Replaces the access token, keeping the stored refresh token.
    async fn update_access(&self, access: &str) -> Result<()> {
        let refresh = self.load().await?.and_then(|t| t.refresh);
        self.save(&Tokens {
            access: access.to_string(),
            refresh,
        })
        .await
    }
}

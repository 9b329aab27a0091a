//! Runtime token providers
//!
//! The token is handed opaquely to the generator, which passes it to the
//! tracking unit of the compiled graph.

use async_trait::async_trait;

use crate::error::Result;

/// Environment variable read by [`EnvTokenProvider`]
pub const TOKEN_ENV: &str = "MLFLOW_TRACKING_TOKEN";

/// Source of the runtime token passed through generation
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String>;
}

/// Reads the token from [`TOKEN_ENV`]; empty when unset
#[derive(Debug, Clone, Default)]
pub struct EnvTokenProvider;

#[async_trait]
impl TokenProvider for EnvTokenProvider {
    async fn token(&self) -> Result<String> {
        Ok(std::env::var(TOKEN_ENV).unwrap_or_default())
    }
}

/// Fixed token
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider(pub String);

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

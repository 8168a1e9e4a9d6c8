use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not obtain access token: {0}")]
pub struct TokenError(pub String);

/// Supplies a bearer token for each outbound call. Tokens are not cached by the facade.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, TokenError>;
}

/// Always hands out the same token.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String, TokenError> {
        if self.0.is_empty() {
            return Err(TokenError("no token configured".to_string()));
        }
        Ok(self.0.clone())
    }
}

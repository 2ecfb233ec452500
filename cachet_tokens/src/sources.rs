//! Token sources

use std::error;

use async_trait::async_trait;

use crate::TokenWithLifetime;

#[cfg(feature = "oauth2")]
pub mod oauth2;

/// An asynchronous source for tokens
///
/// Sources take `&self` so that a shared cache may request tokens from
/// multiple tasks at once.
#[async_trait]
pub trait AsyncTokenSource: Send + Sync {
    /// The error type returned in the event that retrieving a token fails
    type Error: error::Error + Send + Sync + 'static;

    /// Requests a token from an asynchronous source
    async fn request_token(&self) -> Result<TokenWithLifetime, Self::Error>;
}

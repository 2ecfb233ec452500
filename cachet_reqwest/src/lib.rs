//! An HTTP client that automatically attaches cached access tokens to
//! outgoing requests
//!
//! [`AuthorizedClient`] wraps a [`reqwest::Client`] and a shared
//! [`TokenCache`]. Each request is sent with the cache's current access
//! token as a bearer credential. If the server rejects the credential with
//! a `401 Unauthorized` response, the client invalidates the cached token,
//! obtains a fresh one, and replays the request exactly once before giving
//! up.
//!
//! If a request already carries an `Authorization` header, it is sent
//! untouched, and a `401` response is returned to the caller as-is.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cachet_reqwest::AuthorizedClient;
//! use cachet_tokens::{
//!     sources::oauth2::{dto, ClientCredentialsTokenSource},
//!     TokenCache, TokenLifetimeConfig,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")] async fn main() -> color_eyre::Result<()> {
//! let source = ClientCredentialsTokenSource::new(
//!     reqwest::Client::default(),
//!     "https://issuer.example.com/oauth/token".parse()?,
//!     dto::ClientCredentialsWithScope {
//!         credentials: Arc::new(dto::ClientCredentials {
//!             client_id: "svc-billing".into(),
//!             client_secret: "super secret".into(),
//!         }),
//!         scope: None,
//!     },
//!     TokenLifetimeConfig::default(),
//! );
//!
//! let client = AuthorizedClient::new(
//!     reqwest::Client::default(),
//!     Arc::new(TokenCache::new(source)),
//! );
//!
//! let request = client
//!     .client()
//!     .get("https://api.example.com/users")
//!     .build()?;
//!
//! let response = client.execute(request).await?;
//! # Ok(()) }
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_must_use
)]
#![forbid(unsafe_code)]

use std::{fmt, sync::Arc};

use bytes::{BufMut, BytesMut};
use cachet_clock::{Clock, System};
use cachet_tokens::{
    sources::AsyncTokenSource, AccessTokenRef, TokenAcquisitionFailed, TokenCache,
};
use reqwest::{header, Request, Response, StatusCode};
use thiserror::Error;

/// An error encountered while executing an authorized request
#[derive(Debug, Error)]
pub enum ClientError<E> {
    /// No access token could be obtained from the token cache
    #[error("unable to obtain an access token")]
    TokenUnavailable(#[from] TokenAcquisitionFailed<E>),

    /// The request could not be sent
    #[error("error sending request")]
    Transport(#[from] reqwest::Error),

    /// The server rejected the credential even after the cached token
    /// was invalidated and replaced
    #[error("request was unauthorized after acquiring a fresh access token")]
    AuthenticationFailed(Response),
}

/// A `reqwest` client that attaches bearer tokens from a shared token cache
///
/// On a `401 Unauthorized` response the cached token is invalidated and the
/// request is replayed once with a freshly acquired token. Requests whose
/// bodies cannot be cloned, such as streaming bodies, are not replayed; the
/// `401` response is returned directly.
pub struct AuthorizedClient<S, C = System> {
    client: reqwest::Client,
    cache: Arc<TokenCache<S, C>>,
}

impl<S, C> Clone for AuthorizedClient<S, C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<S, C> fmt::Debug for AuthorizedClient<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AuthorizedClient")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl<S, C> AuthorizedClient<S, C> {
    /// Constructs a new client around a shared token cache
    pub fn new(client: reqwest::Client, cache: Arc<TokenCache<S, C>>) -> Self {
        Self { client, cache }
    }

    /// The underlying `reqwest` client, used to build requests
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// The token cache backing this client
    pub fn token_cache(&self) -> &Arc<TokenCache<S, C>> {
        &self.cache
    }
}

impl<S, C> AuthorizedClient<S, C>
where
    S: AsyncTokenSource,
    C: Clock + Send + Sync,
{
    /// Executes a request with a bearer token from the cache
    ///
    /// If the request already has an `Authorization` header, the header is
    /// left in place and the response is returned without any recovery.
    ///
    /// # Errors
    ///
    /// Returns an error if no token can be obtained from the cache, if the
    /// request cannot be sent, or if the server still responds with
    /// `401 Unauthorized` after the token has been renewed.
    pub async fn execute(&self, mut request: Request) -> Result<Response, ClientError<S::Error>> {
        if request.headers().contains_key(header::AUTHORIZATION) {
            return Ok(self.client.execute(request).await?);
        }

        // Cloned up front so the request can be replayed after a rejection.
        // Streaming bodies cannot be cloned and are sent without recovery.
        let retry = request.try_clone();

        let token = self.cache.token().await?;
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, bearer(token.access_token()));

        let response = self.client.execute(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(mut retry) = retry else {
            return Ok(response);
        };

        tracing::debug!("access token was rejected, invalidating and retrying once");
        self.cache.invalidate().await;

        let token = self.cache.token().await?;
        retry
            .headers_mut()
            .insert(header::AUTHORIZATION, bearer(token.access_token()));

        let response = self.client.execute(retry).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("freshly acquired access token was also rejected");
            return Err(ClientError::AuthenticationFailed(response));
        }

        Ok(response)
    }
}

fn bearer(token: &AccessTokenRef) -> header::HeaderValue {
    let mut header_value = BytesMut::with_capacity(token.as_str().len() + 7);
    header_value.put_slice(b"Bearer ");
    header_value.put_slice(token.as_str().as_bytes());
    let mut value =
        header::HeaderValue::from_maybe_shared(header_value).expect("only valid header bytes");
    value.set_sensitive(true);
    value
}

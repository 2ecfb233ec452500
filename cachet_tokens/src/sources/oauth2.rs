//! A token source that uses an OAuth2 server as an authority

use std::marker::PhantomData;

use async_trait::async_trait;
use cachet_clock::Clock;
use thiserror::Error;

use super::AsyncTokenSource;
use crate::{TokenLifetimeConfig, TokenWithLifetime};

pub mod dto;

/// A credentials source for the client credentials flow
#[derive(Debug)]
pub struct ClientCredentialsTokenSource<C, T = FormBody> {
    client: reqwest::Client,
    token_url: reqwest::Url,
    credentials: dto::ClientCredentialsWithScope,
    lifetime_config: TokenLifetimeConfig<C>,
    content_type: PhantomData<fn() -> T>,
}

impl<C> ClientCredentialsTokenSource<C, FormBody> {
    /// Constructs a new client credentials source
    ///
    /// Credentials are sent to the authority as URL-encoded form data, which
    /// is the encoding mandated by [RFC 6749, Section 4.4.2][RFC6749 4.4.2].
    ///
    ///   [RFC6749 4.4.2]: (https://datatracker.ietf.org/doc/html/rfc6749#section-4.4.2)
    pub fn new(
        client: reqwest::Client,
        token_url: reqwest::Url,
        credentials: dto::ClientCredentialsWithScope,
        lifetime_config: TokenLifetimeConfig<C>,
    ) -> Self {
        Self {
            client,
            token_url,
            credentials,
            lifetime_config,
            content_type: PhantomData,
        }
    }

    /// Configures the token source to send credentials to
    /// the authority as JSON
    pub fn using_json(self) -> ClientCredentialsTokenSource<C, JsonBody> {
        ClientCredentialsTokenSource {
            client: self.client,
            token_url: self.token_url,
            credentials: self.credentials,
            lifetime_config: self.lifetime_config,
            content_type: PhantomData,
        }
    }
}

#[async_trait]
impl<C: Clock + Send + Sync, T: RequestType> AsyncTokenSource
    for ClientCredentialsTokenSource<C, T>
{
    type Error = TokenRequestError;

    async fn request_token(&self) -> Result<TokenWithLifetime, Self::Error> {
        request_token::<_, T>(
            &self.client,
            self.token_url.clone(),
            &self.credentials,
            &self.lifetime_config,
        )
        .await
    }
}

/// An error while attempting to request a new token from the authority
#[derive(Debug, Error)]
pub enum TokenRequestError {
    /// An error from the authority with an error body
    #[error("error requesting token from authority: {body}")]
    ErrorWithBody {
        /// The underlying request error
        source: reqwest::Error,
        /// The body of the error
        body: String,
    },
    /// Unable to deserialize the token body
    #[error("error deserializing token body from authority")]
    TokenBodyError(#[from] serde_json::Error),
    /// Unable to read the response
    #[error("error reading response body")]
    BodyReadError(reqwest::Error),
    /// Unable to send a token request to the authority
    #[error("error sending request to authority")]
    RequestSend(reqwest::Error),
}

#[tracing::instrument(
    err,
    skip(client, token_url, credentials, lifetime_config),
    fields(
        token_url = %token_url,
        credentials.grant_type = "client_credentials",
        credentials.client_id = %credentials.client_id(),
    ),
)]
async fn request_token<C: Clock, T: RequestType>(
    client: &reqwest::Client,
    token_url: reqwest::Url,
    credentials: &dto::ClientCredentialsWithScope,
    lifetime_config: &TokenLifetimeConfig<C>,
) -> Result<TokenWithLifetime, TokenRequestError> {
    tracing::trace!("requesting token from authority");

    let req = T::attach_payload(client.post(token_url), credentials);
    let resp = req.send().await.map_err(TokenRequestError::RequestSend)?;

    tracing::debug!(
        response.status = resp.status().as_u16(),
        "received token response from issuing authority"
    );

    if let Err(error) = resp.error_for_status_ref() {
        let body = resp
            .text()
            .await
            .map_err(TokenRequestError::BodyReadError)?;
        return Err(TokenRequestError::ErrorWithBody {
            source: error,
            body,
        });
    }

    let body = resp
        .bytes()
        .await
        .map_err(TokenRequestError::BodyReadError)?;
    let resp: dto::TokenResponse = serde_json::from_slice(&body)?;

    let access_token = (*resp.access_token).to_owned();
    let lifetime = resp.expires_in;

    let token = lifetime_config.create_token(access_token, lifetime);

    tracing::info!(
        lifetime = token.lifetime().0,
        stale = token.stale().0,
        expiry = token.expiry().0,
        "received new token"
    );

    Ok(token)
}

/// A manner of attaching a serializable payload to a request
pub trait RequestType {
    /// Attaches the serializable payload to the request body
    fn attach_payload<S: serde::Serialize>(
        request: reqwest::RequestBuilder,
        payload: &S,
    ) -> reqwest::RequestBuilder;
}

/// Attaches credentials to the request body as JSON
#[derive(Clone, Copy, Debug)]
pub struct JsonBody;

/// Attaches credentials to the request body as URL-encoded form data
#[derive(Clone, Copy, Debug)]
pub struct FormBody;

impl RequestType for JsonBody {
    fn attach_payload<S: serde::Serialize>(
        request: reqwest::RequestBuilder,
        payload: &S,
    ) -> reqwest::RequestBuilder {
        request.json(payload)
    }
}

impl RequestType for FormBody {
    fn attach_payload<S: serde::Serialize>(
        request: reqwest::RequestBuilder,
        payload: &S,
    ) -> reqwest::RequestBuilder {
        request.form(payload)
    }
}

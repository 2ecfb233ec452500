//! Token issuance for the client-credentials grant
//!
//! The issuer authenticates a client against its registry of known client
//! credentials and mints a signed token carrying the granted scope. Clients
//! may request a narrower scope than they were registered with, but never a
//! broader one.

use ahash::AHashMap;
use cachet::{jwt, Algorithm, Hmac, Jwt};
use cachet_clock::{Clock, DurationSecs, System};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{BasicClaimsWithScope, ClientId, ClientIdRef, ClientSecret, ClientSecretRef, Scope};

/// An error encountered while attempting to issue a token
#[derive(Debug, Error)]
pub enum IssueError {
    /// The client is unknown or presented the wrong secret
    ///
    /// The two cases are deliberately indistinguishable to the caller.
    #[error("client authentication failed")]
    InvalidClient,

    /// The requested scope exceeds the scope the client was registered with
    #[error("requested scope exceeds the client's grant")]
    InvalidScope,

    /// The token could not be signed
    #[error("unable to sign token")]
    SigningFailed(#[from] cachet::error::SigningError),
}

#[derive(Debug)]
struct RegisteredClient {
    secret: ClientSecret,
    allowed_scope: Scope,
}

/// The set of clients known to a [`TokenIssuer`]
///
/// Each client is registered with a secret and the maximal scope it may be
/// granted. Secrets are compared in constant time.
#[derive(Debug, Default)]
#[must_use]
pub struct ClientRegistry {
    clients: AHashMap<ClientId, RegisteredClient>,
}

impl ClientRegistry {
    /// An empty registry, which can authenticate no one
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client along with the maximal scope it may be granted
    pub fn register(
        &mut self,
        client_id: ClientId,
        secret: ClientSecret,
        allowed_scope: Scope,
    ) {
        self.clients.insert(
            client_id,
            RegisteredClient {
                secret,
                allowed_scope,
            },
        );
    }

    /// Registers a client, builder style
    pub fn with_client(
        mut self,
        client_id: ClientId,
        secret: ClientSecret,
        allowed_scope: Scope,
    ) -> Self {
        self.register(client_id, secret, allowed_scope);
        self
    }

    fn authenticate(
        &self,
        client_id: &ClientIdRef,
        client_secret: &ClientSecretRef,
    ) -> Option<&RegisteredClient> {
        let client = self.clients.get(client_id)?;
        ring::constant_time::verify_slices_are_equal(
            client.secret.as_str().as_bytes(),
            client_secret.as_str().as_bytes(),
        )
        .ok()?;
        Some(client)
    }
}

/// The type of token issued, always a bearer token
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    /// A bearer token, which grants access to whoever presents it
    Bearer,
}

/// A freshly issued token and its grant metadata
#[derive(Clone, Debug, Serialize)]
#[must_use]
pub struct IssuedToken {
    /// The signed access token
    pub access_token: Jwt,

    /// The type of the issued token
    pub token_type: TokenType,

    /// The lifetime of the token, in seconds from the time of issue
    pub expires_in: DurationSecs,

    /// The scope granted to the token
    #[serde(skip_serializing_if = "Scope::is_empty")]
    pub scope: Scope,
}

/// Issues signed tokens to authenticated clients
///
/// The issuer and the verifying [`Authority`][crate::Authority] share an
/// HMAC secret. The issuer stamps every token with its configured issuer
/// name, audience, a unique token identifier, and an expiry derived from
/// its clock.
#[derive(Debug)]
#[must_use]
pub struct TokenIssuer<C = System> {
    key: Hmac,
    algorithm: Algorithm,
    issuer: jwt::Issuer,
    audience: jwt::Audience,
    token_lifetime: DurationSecs,
    clients: ClientRegistry,
    clock: C,
}

/// The default lifetime of an issued token
pub const DEFAULT_TOKEN_LIFETIME: DurationSecs = DurationSecs(3600);

impl TokenIssuer {
    /// Constructs an issuer around a shared HMAC secret and client registry
    pub fn new(
        key: Hmac,
        algorithm: Algorithm,
        issuer: jwt::Issuer,
        audience: jwt::Audience,
        clients: ClientRegistry,
    ) -> Self {
        Self {
            key,
            algorithm,
            issuer,
            audience,
            token_lifetime: DEFAULT_TOKEN_LIFETIME,
            clients,
            clock: System,
        }
    }
}

impl<C> TokenIssuer<C> {
    /// Sets the lifetime stamped onto issued tokens
    pub fn with_token_lifetime(self, token_lifetime: DurationSecs) -> Self {
        Self {
            token_lifetime,
            ..self
        }
    }

    /// Replaces the clock used to stamp issuance and expiry times
    pub fn with_clock<C2>(self, clock: C2) -> TokenIssuer<C2> {
        TokenIssuer {
            key: self.key,
            algorithm: self.algorithm,
            issuer: self.issuer,
            audience: self.audience,
            token_lifetime: self.token_lifetime,
            clients: self.clients,
            clock,
        }
    }
}

impl<C: Clock> TokenIssuer<C> {
    /// Authenticates the client and issues a token for the granted scope
    ///
    /// When `requested_scope` is `None`, the client's full registered scope
    /// is granted, per [RFC 6749, Section 3.3][RFC6749 3.3].
    ///
    ///   [RFC6749 3.3]: (https://datatracker.ietf.org/doc/html/rfc6749#section-3.3)
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be authenticated, if the
    /// requested scope exceeds the client's registered scope, or if the
    /// token cannot be signed.
    pub fn issue_token(
        &self,
        client_id: &ClientIdRef,
        client_secret: &ClientSecretRef,
        requested_scope: Option<Scope>,
    ) -> Result<IssuedToken, IssueError> {
        let Some(client) = self.clients.authenticate(client_id, client_secret) else {
            tracing::warn!(client_id = %client_id, "client authentication failed");
            return Err(IssueError::InvalidClient);
        };

        let granted = match requested_scope {
            Some(requested) => {
                if !client.allowed_scope.contains_all(&requested) {
                    tracing::warn!(
                        client_id = %client_id,
                        "requested scope exceeds the client's grant"
                    );
                    return Err(IssueError::InvalidScope);
                }
                requested
            }
            None => client.allowed_scope.clone(),
        };

        let claims = BasicClaimsWithScope {
            basic: jwt::Claims::new()
                .with_issuer(self.issuer.clone())
                .with_audience(self.audience.clone())
                .with_subject(client_id.as_str())
                .with_token_id(uuid::Uuid::new_v4().to_string())
                .with_lifetime_from_clock(self.token_lifetime, &self.clock),
            scope: granted.clone(),
        };

        let access_token =
            Jwt::try_from_parts_with_signature(&jwt::Headers::new(self.algorithm), &claims, &self.key)?;

        tracing::debug!(client_id = %client_id, "issued client-credentials token");

        Ok(IssuedToken {
            access_token,
            token_type: TokenType::Bearer,
            expires_in: self.token_lifetime,
            scope: granted,
        })
    }
}

//! Middleware and handlers for serving a token-protected API with `axum`
//!
//! Three pieces combine into a working authority-backed server:
//!
//! * [`token_endpoint`] serves `POST /oauth/token`, exchanging client
//!   credentials for a signed bearer token
//! * [`Oauth2Authorizer::jwt_layer`] authenticates every request bearing a
//!   token, placing the verified claims into the request extensions
//! * [`Oauth2Authorizer::scope_layer`] authorizes individual routes against
//!   a [`ScopePolicy`][cachet_oauth2::ScopePolicy]
//!
//! Authentication failures are reported as `401 Unauthorized` without
//! detail; authorization failures are reported as `403 Forbidden` with a
//! `www-authenticate` header naming the scopes that would have been
//! accepted.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use axum::routing::get;
//! use cachet::{jwt, Algorithm, Hmac};
//! use cachet_axum::{token_endpoint, Oauth2Authorizer};
//! use cachet_oauth2::{policy, scope, Authority, ClientRegistry, TokenIssuer};
//!
//! # fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let key = Hmac::generate(Algorithm::HS256)?;
//!
//! let registry = ClientRegistry::new().with_client(
//!     "svc-billing".into(),
//!     "billing-secret".into(),
//!     scope!["users:read"],
//! );
//!
//! let issuer = Arc::new(TokenIssuer::new(
//!     key.clone(),
//!     Algorithm::HS256,
//!     jwt::Issuer::from_static("authority"),
//!     jwt::Audience::from_static("my_api"),
//!     registry,
//! ));
//!
//! let authority = Authority::new(
//!     key,
//!     jwt::CoreValidator::default()
//!         .add_approved_algorithm(Algorithm::HS256)
//!         .require_issuer(jwt::Issuer::from_static("authority"))
//!         .add_allowed_audience(jwt::Audience::from_static("my_api")),
//! );
//!
//! let authorizer = Oauth2Authorizer::new().with_terse_error_handler();
//!
//! let app = axum::Router::new()
//!     .route(
//!         "/users",
//!         get(|| async { "users" })
//!             .layer(authorizer.scope_layer(policy![scope!["users:read"]])),
//!     )
//!     .layer(authorizer.jwt_layer(authority))
//!     .merge(token_endpoint::routes(issuer));
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_must_use
)]
#![forbid(unsafe_code)]

use std::{fmt, marker::PhantomData};

mod authorizer;
mod jwt;
mod oauth2;
pub mod token_endpoint;
pub mod util;

pub use authorizer::Oauth2Authorizer;
pub use jwt::OnJwtError;
pub use oauth2::OnScopeError;

/// Terse responders for authentication and authorization failures
///
/// Responses generated by this handler carry the relevant status code and
/// `www-authenticate` header, but no error descriptions.
pub struct TerseErrorHandler<ResBody = axum::body::Body> {
    _ty: PhantomData<fn() -> ResBody>,
}

impl<ResBody> TerseErrorHandler<ResBody> {
    /// Instantiates a new instance over a given body type
    #[inline]
    pub fn new() -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> fmt::Debug for TerseErrorHandler<ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("TerseErrorHandler")
    }
}

impl<ResBody> Default for TerseErrorHandler<ResBody> {
    #[inline]
    fn default() -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> Clone for TerseErrorHandler<ResBody> {
    #[inline]
    fn clone(&self) -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> Copy for TerseErrorHandler<ResBody> {}

/// Verbose responders for authentication and authorization failures
///
/// In addition to the relevant status code and `www-authenticate` header,
/// responses generated by this handler describe why the request was
/// rejected. Intended for development; the descriptions may reveal more
/// about the verification plan than a production deployment should.
pub struct VerboseErrorHandler<ResBody = axum::body::Body> {
    _ty: PhantomData<fn() -> ResBody>,
}

impl<ResBody> VerboseErrorHandler<ResBody> {
    /// Instantiates a new instance over a given body type
    #[inline]
    pub fn new() -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> fmt::Debug for VerboseErrorHandler<ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("VerboseErrorHandler")
    }
}

impl<ResBody> Default for VerboseErrorHandler<ResBody> {
    #[inline]
    fn default() -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> Clone for VerboseErrorHandler<ResBody> {
    #[inline]
    fn clone(&self) -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> Copy for VerboseErrorHandler<ResBody> {}

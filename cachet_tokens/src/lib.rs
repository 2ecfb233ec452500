//! Client-side caching and renewal of bearer tokens
//!
//! Obtaining a token is expensive: it costs a round trip to the issuing
//! authority and a signature on the authority's side. This crate keeps a
//! single token cached and renews it on demand, shortly before it would
//! expire, so that callers almost always find a usable token waiting.
//!
//! * [`sources::AsyncTokenSource`] abstracts over where tokens come from;
//!   [`sources::oauth2::ClientCredentialsTokenSource`] implements the OAuth2
//!   client-credentials flow over HTTP
//! * [`TokenCache`] holds the token, judges freshness against its clock, and
//!   renews through the source when needed

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
#![deny(unsafe_code)]

mod braids;
pub mod cache;
pub mod sources;
mod tokens;

pub use braids::{AccessToken, AccessTokenRef};
pub use cache::{TokenAcquisitionFailed, TokenCache};
pub use tokens::{TokenLifetimeConfig, TokenStatus, TokenWithLifetime};

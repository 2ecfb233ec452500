//! Client-credentials token issuance and scope-based authorization
//!
//! This crate holds both halves of the trust relationship:
//!
//! * [`TokenIssuer`] authenticates clients against a [`ClientRegistry`] and
//!   mints signed tokens carrying the granted scope
//! * [`Authority`] verifies presented tokens and evaluates their scope
//!   against a [`ScopePolicy`]
//!
//! The two halves share an HMAC secret; nothing else passes between them but
//! the token itself.

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

mod authority;
mod braids;
pub mod issuer;
pub mod policy;
pub mod scope;

pub use authority::{Authority, AuthorityError};
pub use braids::{ClientId, ClientIdRef, ClientSecret, ClientSecretRef};
pub use issuer::{ClientRegistry, IssueError, IssuedToken, TokenIssuer, TokenType};
pub use policy::{InsufficientScope, ScopePolicy};
pub use scope::{
    BasicClaimsWithScope, HasScope, InvalidScopeToken, Scope, ScopeToken, ScopeTokenRef,
};

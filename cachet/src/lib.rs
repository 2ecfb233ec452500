//! Implementations of compact HMAC-signed bearer tokens
//!
//! This crate provides the signing primitive shared by the token issuer and
//! the verifying middleware: an immutable HMAC secret, a small set of
//! approved algorithms, and a claims validator with a fixed validation plan.
//!
//! Features:
//! * `Hmac`: an HMAC secret usable with `HS256`, `HS384`, and `HS512`
//! * `Jwt`: a compact three-segment signed token with redacted debugging
//! * `jwt::CoreValidator`: fail-closed claims validation with expiry leeway

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

pub mod error;
mod hmac;
pub mod jwt;

pub use hmac::{Algorithm, Hmac};
pub use jwt::{Jwt, JwtRef};

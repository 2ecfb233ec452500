//! HMAC signing and verification for compact tokens
//!
//! This design deliberately supports only symmetric MAC schemes. The
//! algorithm accepted by a verifier is pinned at construction; tokens naming
//! any other algorithm are rejected before their claims are considered.

use std::{fmt, str::FromStr};

use ring::rand::SecureRandom;
use serde::{Deserialize, Serialize};

use crate::error;

/// HMAC signing algorithms
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[allow(clippy::upper_case_acronyms)]
pub enum Algorithm {
    /// HMAC using SHA-256
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
}

impl Algorithm {
    /// Recommended key size in bytes for an HMAC secret
    #[must_use]
    fn recommended_key_size(self) -> usize {
        match self {
            Self::HS256 => 256 / 8,
            Self::HS384 => 384 / 8,
            Self::HS512 => 512 / 8,
        }
    }

    /// The size in bytes of an HMAC signature
    #[must_use]
    pub fn signature_size(self) -> usize {
        match self {
            Self::HS256 => 256 / 8,
            Self::HS384 => 384 / 8,
            Self::HS512 => 512 / 8,
        }
    }

    fn into_ring_algorithm(self) -> ring::hmac::Algorithm {
        match self {
            Self::HS256 => ring::hmac::HMAC_SHA256,
            Self::HS384 => ring::hmac::HMAC_SHA384,
            Self::HS512 => ring::hmac::HMAC_SHA512,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        };

        f.write_str(s)
    }
}

impl FromStr for Algorithm {
    type Err = error::ClaimsRejected;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            _ => Err(error::ClaimsRejected::InvalidAlgorithm),
        }
    }
}

/// HMAC secret
///
/// The secret is immutable once constructed and is shared read-only between
/// the issuing and verifying halves of the system.
#[derive(Clone, PartialEq, Eq)]
#[must_use]
pub struct Hmac {
    secret: Vec<u8>,
}

impl fmt::Debug for Hmac {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Hmac { secret }")
    }
}

impl Hmac {
    /// HMAC using the provided secret
    ///
    /// # Errors
    ///
    /// Returns [`error::SigningError::UnusableSecret`] if the secret is
    /// empty. An empty secret is always a deployment mistake, so it is
    /// rejected at construction rather than at first use.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, error::SigningError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(error::SigningError::UnusableSecret);
        }
        Ok(Self { secret })
    }

    /// Generates a new random HMAC secret sized for the given algorithm
    ///
    /// # Errors
    ///
    /// Unable to generate a new HMAC secret.
    pub fn generate(alg: Algorithm) -> Result<Self, error::SigningError> {
        Self::generate_with_rng(alg, &ring::rand::SystemRandom::new())
    }

    /// Generates a new HMAC secret using the provided source of randomness
    ///
    /// # Errors
    ///
    /// Unable to generate a new HMAC secret from the provided RNG.
    pub fn generate_with_rng(
        alg: Algorithm,
        rng: &dyn SecureRandom,
    ) -> Result<Self, error::SigningError> {
        let mut secret = vec![0; alg.recommended_key_size()];

        rng.fill(&mut secret)
            .map_err(|_| error::SigningError::UnusableSecret)?;

        Ok(Self { secret })
    }

    /// Signs the message with the given algorithm
    pub(crate) fn sign(&self, alg: Algorithm, data: &[u8]) -> Vec<u8> {
        let key = ring::hmac::Key::new(alg.into_ring_algorithm(), &self.secret);
        let digest = ring::hmac::sign(&key, data);
        digest.as_ref().to_owned()
    }

    /// Verifies the signature over the message with the given algorithm
    ///
    /// # Errors
    ///
    /// Returns an error if the signature does not match. The comparison is
    /// performed in constant time by `ring`.
    pub(crate) fn verify(
        &self,
        alg: Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), error::SignatureMismatch> {
        let key = ring::hmac::Key::new(alg.into_ring_algorithm(), &self.secret);
        ring::hmac::verify(&key, data, signature).map_err(|_| error::signature_mismatch())
    }
}

//! Authority for verifying tokens presented to a protected API

use cachet::{jwt, Hmac, JwtRef};
use serde::Deserialize;
use thiserror::Error;

use crate::{HasScope, InsufficientScope, ScopePolicy};

/// An error during token verification or authorization
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// The token is malformed, improperly signed, or carries rejected claims
    #[error("token is not valid")]
    TokenVerifyError(#[from] cachet::error::JwtVerifyError),

    /// The token is valid, but its scope does not satisfy the access policy
    #[error(transparent)]
    PolicyDenial(#[from] InsufficientScope),
}

/// An authority backed by a shared HMAC secret and a fixed validation plan
///
/// The authority verifies that a token was signed with the shared secret and
/// that its claims pass the configured validator before the access policy is
/// consulted. An improperly signed token never reaches policy evaluation.
#[derive(Clone, Debug)]
#[must_use]
pub struct Authority {
    key: Hmac,
    validator: jwt::CoreValidator,
}

impl Authority {
    /// Constructs a new authority from a shared secret and validation plan
    pub fn new(key: Hmac, validator: jwt::CoreValidator) -> Self {
        Self { key, validator }
    }

    /// Verifies a token and evaluates its scope against an access policy
    ///
    /// # Errors
    ///
    /// Returns an error if the token is invalid or if the scope held by the
    /// token does not satisfy the policy.
    pub fn verify_token<T>(
        &self,
        token: &JwtRef,
        policy: &ScopePolicy,
    ) -> Result<T, AuthorityError>
    where
        T: for<'de> Deserialize<'de> + jwt::CoreClaims + HasScope,
    {
        let validated: jwt::Validated<T> = token.verify(&self.key, &self.validator)?;

        policy.evaluate(validated.claims().scope())?;

        let (_, claims) = validated.extract();
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use cachet::Algorithm;
    use cachet_clock::DurationSecs;
    use color_eyre::Result;

    use crate::{policy, scope, BasicClaimsWithScope, Scope};

    use super::*;

    fn signed_token(key: &Hmac, scope: Scope) -> Result<cachet::Jwt> {
        let claims = BasicClaimsWithScope {
            basic: jwt::Claims::new()
                .with_subject("svc-under-test")
                .with_token_id("token-0001")
                .with_lifetime(DurationSecs(60)),
            scope,
        };
        Ok(cachet::Jwt::try_from_parts_with_signature(
            &jwt::Headers::new(Algorithm::HS256),
            &claims,
            key,
        )?)
    }

    #[test]
    fn valid_token_with_sufficient_scope_is_accepted() -> Result<()> {
        let key = Hmac::generate(Algorithm::HS256)?;
        let authority = Authority::new(
            key.clone(),
            jwt::CoreValidator::default().add_approved_algorithm(Algorithm::HS256),
        );

        let token = signed_token(&key, scope!["users:read"])?;
        let claims: BasicClaimsWithScope =
            authority.verify_token(&token, &policy![scope!["users:read"]])?;
        assert_eq!(claims.scope, scope!["users:read"]);
        Ok(())
    }

    #[test]
    fn insufficient_scope_is_a_policy_denial() -> Result<()> {
        let key = Hmac::generate(Algorithm::HS256)?;
        let authority = Authority::new(
            key.clone(),
            jwt::CoreValidator::default().add_approved_algorithm(Algorithm::HS256),
        );

        let token = signed_token(&key, scope!["users:read"])?;
        let err = authority
            .verify_token::<BasicClaimsWithScope>(&token, &policy![scope!["users:admin"]])
            .unwrap_err();
        assert!(matches!(err, AuthorityError::PolicyDenial(_)));
        Ok(())
    }

    #[test]
    fn token_signed_with_another_key_is_rejected_before_policy() -> Result<()> {
        let key = Hmac::generate(Algorithm::HS256)?;
        let other = Hmac::generate(Algorithm::HS256)?;
        let authority = Authority::new(
            other,
            jwt::CoreValidator::default().add_approved_algorithm(Algorithm::HS256),
        );

        let token = signed_token(&key, scope!["users:read"])?;
        let err = authority
            .verify_token::<BasicClaimsWithScope>(&token, &ScopePolicy::allow_any())
            .unwrap_err();
        assert!(matches!(err, AuthorityError::TokenVerifyError(e) if e.is_signature_mismatch()));
        Ok(())
    }
}

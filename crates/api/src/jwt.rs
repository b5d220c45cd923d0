//! HS256 bearer tokens carrying [`AuthClaims`].

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use keystone_auth::{AuthClaims, JwtValidator, TokenValidationError, validate_claims};

/// Shared-secret validator and issuer.
///
/// The claim time window uses `issued_at`/`expires_at` rather than the
/// registered `exp`/`iat` numeric claims, so the library's own time checks are
/// disabled and [`validate_claims`] runs instead.
pub struct Hs256JwtValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(&self, claims: &AuthClaims) -> Result<String, TokenValidationError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str) -> Result<AuthClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<AuthClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, Utc::now())?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use keystone_auth::Principal;
    use keystone_core::PrincipalId;

    fn claims(ttl: Duration) -> AuthClaims {
        let principal = Principal::new(PrincipalId::new(3), ["editor"], ["menu:read"]);
        AuthClaims::issue(&principal, Utc::now() - Duration::seconds(1), ttl).unwrap()
    }

    #[test]
    fn issued_tokens_validate() {
        let jwt = Hs256JwtValidator::new("secret");
        let original = claims(Duration::minutes(5));
        let token = jwt.issue(&original).unwrap();
        assert_eq!(jwt.validate(&token).unwrap(), original);
    }

    #[test]
    fn wrong_secret_is_malformed() {
        let token = Hs256JwtValidator::new("secret")
            .issue(&claims(Duration::minutes(5)))
            .unwrap();
        assert!(matches!(
            Hs256JwtValidator::new("other").validate(&token),
            Err(TokenValidationError::Malformed(_))
        ));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let jwt = Hs256JwtValidator::new("secret");
        let mut stale = claims(Duration::minutes(5));
        stale.issued_at -= Duration::hours(1);
        stale.expires_at -= Duration::hours(1);
        let token = jwt.issue(&stale).unwrap();
        assert_eq!(jwt.validate(&token), Err(TokenValidationError::Expired));
    }
}

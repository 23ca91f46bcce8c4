//! HS256 bearer tokens: issuing at login, validating on every request.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde_json::Value;
use thiserror::Error;

use crate::claims::{TokenClaims, TokenValidationError, validate_claims};
use crate::UserEntity;

/// Validates a raw bearer token into typed claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenValidationError>;
}

/// Signs claims for an authenticated user.
pub trait JwtIssuer: Send + Sync {
    fn issue(&self, user: &UserEntity, now: DateTime<Utc>) -> Result<IssuedToken, TokenIssueError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum TokenIssueError {
    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Shared-secret (HMAC-SHA256) token codec with fixed issuer/audience.
///
/// Built once at start-up; read-only afterwards.
#[derive(Clone)]
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl core::fmt::Debug for Hs256Jwt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Jwt")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl Hs256Jwt {
    pub const DEFAULT_TTL_MINUTES: i64 = 30;

    pub fn new(
        secret: &[u8],
        issuer: impl Into<String>,
        audience: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl,
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        // Lifetime is checked by `validate_claims` against the caller's clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_required_spec_claims(&["iss", "aud"]);
        validation
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenValidationError> {
        let data = decode::<Value>(token, &self.decoding, &self.validation())
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;

        let claims = TokenClaims::from_payload(data.claims)?;
        validate_claims(&claims, now)?;
        Ok(claims)
    }
}

impl JwtIssuer for Hs256Jwt {
    fn issue(&self, user: &UserEntity, now: DateTime<Utc>) -> Result<IssuedToken, TokenIssueError> {
        let claims = TokenClaims::for_user(user, &self.issuer, &self.audience, now, self.ttl);
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(IssuedToken {
            token,
            expires_at: claims.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use serde_json::json;
    use warden_core::UserId;

    const SECRET: &[u8] = b"test-secret-with-some-length";

    fn jwt() -> Hs256Jwt {
        Hs256Jwt::new(SECRET, "warden", "warden-clients", Duration::minutes(30))
    }

    fn admin() -> UserEntity {
        let mut u = UserEntity::new(Role::Admin, "Ada", "ada@x.com", "pw").with_company("Acme");
        u.id = UserId::new();
        u
    }

    #[test]
    fn issued_token_validates() {
        let jwt = jwt();
        let now = Utc::now();
        let issued = jwt.issue(&admin(), now).unwrap();
        let claims = jwt.validate(&issued.token, now).unwrap();
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.email, "ada@x.com");
        assert_eq!(claims.iss, "warden");
        assert_eq!(claims.aud, "warden-clients");
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = jwt();
        let issued_at = Utc::now() - Duration::minutes(31);
        let issued = jwt.issue(&admin(), issued_at).unwrap();
        assert_eq!(
            jwt.validate(&issued.token, Utc::now()),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn wrong_key_is_malformed() {
        let other = Hs256Jwt::new(b"another-secret-entirely", "warden", "warden-clients", Duration::minutes(30));
        let issued = other.issue(&admin(), Utc::now()).unwrap();
        assert!(matches!(
            jwt().validate(&issued.token, Utc::now()),
            Err(TokenValidationError::Malformed(_))
        ));
    }

    #[test]
    fn wrong_audience_is_malformed() {
        let other = Hs256Jwt::new(SECRET, "warden", "someone-else", Duration::minutes(30));
        let issued = other.issue(&admin(), Utc::now()).unwrap();
        assert!(matches!(
            jwt().validate(&issued.token, Utc::now()),
            Err(TokenValidationError::Malformed(_))
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            jwt().validate("not.a.jwt", Utc::now()),
            Err(TokenValidationError::Malformed(_))
        ));
    }

    #[test]
    fn signed_token_without_role_reports_missing_claim() {
        let now = Utc::now().timestamp();
        let payload = json!({
            "sub": UserId::new(),
            "iss": "warden",
            "aud": "warden-clients",
            "iat": now,
            "exp": now + 600,
        });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert_eq!(
            jwt().validate(&token, Utc::now()),
            Err(TokenValidationError::ClaimMissing("role"))
        );
    }
}

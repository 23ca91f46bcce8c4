use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use warden_core::UserId;

use crate::{Role, UserEntity};

/// Name of the claim carrying the directory role.
pub const ROLE_CLAIM: &str = "role";

/// Signed claims carried by an issued bearer token.
///
/// Built from a [`UserEntity`] at issuance time: every non-secret attribute, never the
/// password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject / user identifier.
    pub sub: UserId,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub service_type: String,
    pub company: String,
    pub company_id: String,
    pub bucket: String,
    pub site: String,
    pub site_id: String,
    pub zone: String,
    pub zone_id: String,
    pub role_detail: String,

    pub iss: String,
    pub aud: String,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl TokenClaims {
    pub fn for_user(
        user: &UserEntity,
        issuer: &str,
        audience: &str,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            sub: user.id,
            role: user.role,
            name: user.name.clone(),
            email: user.email.clone(),
            service_type: user.service_type.clone(),
            company: user.company.name.clone(),
            company_id: user.company.id.clone(),
            bucket: user.bucket_topic.clone(),
            site: user.site.name.clone(),
            site_id: user.site.id.clone(),
            zone: user.zone.name.clone(),
            zone_id: user.zone.id.clone(),
            role_detail: user.role_detail.clone(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    /// Build typed claims from a verified JSON payload.
    ///
    /// The role claim is inspected first so that a missing or unknown role is
    /// reported as such rather than as a generic shape error.
    pub fn from_payload(payload: Value) -> Result<Self, TokenValidationError> {
        let role = match payload.get(ROLE_CLAIM) {
            None | Some(Value::Null) => return Err(TokenValidationError::ClaimMissing(ROLE_CLAIM)),
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(TokenValidationError::ClaimMissing(ROLE_CLAIM));
            }
            Some(Value::String(s)) => s.clone(),
            Some(other) => return Err(TokenValidationError::RoleNotRecognized(other.to_string())),
        };
        if role.parse::<Role>().is_err() {
            return Err(TokenValidationError::RoleNotRecognized(role));
        }

        serde_json::from_value(payload).map_err(|e| TokenValidationError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("token malformed: {0}")]
    Malformed(String),

    #[error("claim missing: {0}")]
    ClaimMissing(&'static str),

    #[error("role not recognized: {0}")]
    RoleNotRecognized(String),
}

/// Deterministically validate the time window of token claims.
///
/// Signature, issuer, and audience checks happen while decoding (see `token`).
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn employee() -> UserEntity {
        let mut u = UserEntity::new(Role::Employee, "Eve", "eve@x.com", "s3cret")
            .with_company("Acme")
            .with_site("North");
        u.id = UserId::new();
        u.company.id = "AC".into();
        u
    }

    #[test]
    fn claims_never_carry_the_password() {
        let claims = TokenClaims::for_user(&employee(), "warden", "warden", Utc::now(), Duration::minutes(30));
        let payload = serde_json::to_string(&claims).unwrap();
        assert!(!payload.contains("s3cret"));
        assert!(!payload.to_lowercase().contains("password"));
        assert_eq!(claims.company_id, "AC");
        assert_eq!(claims.site, "North");
    }

    #[test]
    fn window_is_thirty_minutes() {
        let now = Utc::now();
        let claims = TokenClaims::for_user(&employee(), "i", "a", now, Duration::minutes(30));
        assert!(validate_claims(&claims, now).is_ok());
        assert!(validate_claims(&claims, now + Duration::minutes(29)).is_ok());
        assert_eq!(
            validate_claims(&claims, now + Duration::minutes(30)),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims, now - Duration::minutes(1)),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn payload_role_checks_are_distinct() {
        let claims = TokenClaims::for_user(&employee(), "i", "a", Utc::now(), Duration::minutes(30));
        let mut payload = serde_json::to_value(&claims).unwrap();

        payload[ROLE_CLAIM] = json!("Janitor");
        assert_eq!(
            TokenClaims::from_payload(payload.clone()),
            Err(TokenValidationError::RoleNotRecognized("Janitor".into()))
        );

        payload.as_object_mut().unwrap().remove(ROLE_CLAIM);
        assert_eq!(
            TokenClaims::from_payload(payload),
            Err(TokenValidationError::ClaimMissing(ROLE_CLAIM))
        );
    }

    #[test]
    fn payload_without_subject_is_malformed() {
        let payload = json!({ "role": "Admin" });
        assert!(matches!(
            TokenClaims::from_payload(payload),
            Err(TokenValidationError::Malformed(_))
        ));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_auth::{IssuedToken, Role, ScopeRef, UserEntity, unset_timestamp};
use warden_core::{DomainError, UserId};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of create and update requests.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub site: String,
    #[serde(default)]
    pub zone: String,
    /// Job role detail; the directory role is `type`.
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub service_type: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserRequest {
    pub fn role(&self) -> Result<Role, DomainError> {
        parse_role(&self.kind)
    }

    pub fn into_entity(self) -> Result<UserEntity, DomainError> {
        let role = self.role()?;
        let mut entity = UserEntity::new(role, self.name, self.email, self.password);
        entity.id = self.user_id.unwrap_or_default();
        entity.service_type = self.service_type;
        entity.company = ScopeRef::named(self.company);
        entity.site = ScopeRef::named(self.site);
        entity.zone = ScopeRef::named(self.zone);
        entity.role_detail = self.role;
        entity.created_at = self.created_at.unwrap_or_else(unset_timestamp);
        Ok(entity)
    }
}

#[derive(Debug, Deserialize)]
pub struct ListUsersParams {
    #[serde(rename = "pageNumber", default = "first_page")]
    pub page_number: usize,
}

fn first_page() -> usize {
    1
}

pub fn parse_role(s: &str) -> Result<Role, DomainError> {
    s.parse::<Role>()
        .map_err(|_| DomainError::validation("type must be one of: SuperAdmin, Admin, Employee"))
}

pub fn parse_user_id(s: &str) -> Result<UserId, DomainError> {
    let id: UserId = s.parse()?;
    if id.is_nil() {
        return Err(DomainError::invalid_id("user id must not be nil"));
    }
    Ok(id)
}

// -------------------------
// Response DTOs
// -------------------------

/// A user as returned to callers. Never carries the password.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub user_id: UserId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Role,
    pub email: String,
    pub service_type: String,
    pub company: String,
    pub company_id: String,
    pub bucket: String,
    pub site: String,
    pub site_id: String,
    pub zone: String,
    pub zone_id: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserEntity> for UserResponse {
    fn from(u: UserEntity) -> Self {
        Self {
            user_id: u.id,
            name: u.name,
            kind: u.role,
            email: u.email,
            service_type: u.service_type,
            company: u.company.name,
            company_id: u.company.id,
            bucket: u.bucket_topic,
            site: u.site.name,
            site_id: u.site.id,
            zone: u.zone.name,
            zone_id: u.zone.id,
            role: u.role_detail,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl From<IssuedToken> for TokenResponse {
    fn from(t: IssuedToken) -> Self {
        Self {
            token: t.token,
            expires_at: t.expires_at,
        }
    }
}

pub fn to_json<T: Serialize>(value: T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_maps_onto_entity() {
        let body = json!({
            "name": "Eve",
            "type": "Employee",
            "company": "Acme",
            "site": "North",
            "role": "Operator",
            "email": "eve@x.com",
            "serviceType": "monitoring",
            "password": "pw"
        });
        let req: UserRequest = serde_json::from_value(body).unwrap();
        let e = req.into_entity().unwrap();
        assert_eq!(e.role, Role::Employee);
        assert_eq!(e.company.name, "Acme");
        assert_eq!(e.role_detail, "Operator");
        assert_eq!(e.service_type, "monitoring");
        assert!(e.id.is_nil());
        assert_eq!(e.created_at, unset_timestamp());
    }

    #[test]
    fn unknown_type_is_validation_error() {
        let req: UserRequest = serde_json::from_value(json!({ "type": "Boss" })).unwrap();
        assert!(matches!(req.into_entity(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn response_omits_password() {
        let mut u = UserEntity::new(Role::Admin, "A", "a@x.com", "hunter2");
        u.id = UserId::new();
        let v = to_json(UserResponse::from(u));
        let text = v.to_string();
        assert!(!text.contains("hunter2"));
        assert!(v.get("password").is_none());
        assert_eq!(v["type"], "Admin");
    }

    #[test]
    fn nil_id_is_rejected() {
        assert!(parse_user_id("00000000-0000-0000-0000-000000000000").is_err());
        assert!(parse_user_id("nope").is_err());
        assert!(parse_user_id(&UserId::new().to_string()).is_ok());
    }
}

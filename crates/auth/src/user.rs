//! Directory user entity.
//!
//! `UserEntity` is the canonical record owned by the directory service. It is a plain
//! value: persistence (projection onto tag/field writes) lives in the infra codec.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::UserId;

use crate::Role;

/// Timestamp standing for "not set". Lenient date parsing also falls back to it.
pub fn unset_timestamp() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Password
// ─────────────────────────────────────────────────────────────────────────────

/// Stored password secret.
///
/// Compared by plain equality; no hashing is applied on either side. `Debug` is
/// redacted so the secret never reaches logs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PasswordSecret(String);

impl PasswordSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.0 == candidate
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl core::fmt::Debug for PasswordSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PasswordSecret(***)")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Organizational scope
// ─────────────────────────────────────────────────────────────────────────────

/// A (human identifier, canonical short identifier) pair for a company, site, or zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeRef {
    pub name: String,
    pub id: String,
}

impl ScopeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: String::new(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.name.trim().is_empty()
    }

    pub fn clear(&mut self) {
        self.name.clear();
        self.id.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User entity
// ─────────────────────────────────────────────────────────────────────────────

/// Directory user.
///
/// # Invariants
/// - `id` is immutable after creation.
/// - `email` is unique across the directory (enforced by the directory service).
/// - Scope attributes the role does not use are blank, never absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntity {
    pub id: UserId,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub password: PasswordSecret,
    pub service_type: String,
    pub company: ScopeRef,
    pub bucket_topic: String,
    pub site: ScopeRef,
    pub zone: ScopeRef,
    /// Free-form job role of an Employee (distinct from the directory `role`).
    pub role_detail: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserEntity {
    pub fn new(
        role: Role,
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id: UserId::default(),
            role,
            name: name.into(),
            email: email.into(),
            password: PasswordSecret::new(password),
            service_type: String::new(),
            company: ScopeRef::default(),
            bucket_topic: String::new(),
            site: ScopeRef::default(),
            zone: ScopeRef::default(),
            role_detail: String::new(),
            created_at: unset_timestamp(),
            updated_at: unset_timestamp(),
        }
    }

    /// Empty record for a known id (decode starting point).
    pub fn empty(id: UserId, role: Role) -> Self {
        Self {
            id,
            ..Self::new(role, "", "", "")
        }
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = ScopeRef::named(company);
        self
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = ScopeRef::named(site);
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = ScopeRef::named(zone);
        self
    }

    /// Clear every scope attribute the role does not use.
    pub fn blank_inapplicable(&mut self) {
        if !self.role.has_company() {
            self.company.clear();
            self.bucket_topic.clear();
        }
        if !self.role.has_site_scope() {
            self.site.clear();
            self.zone.clear();
            self.role_detail.clear();
        }
    }

    /// Required attributes are present.
    pub fn validate_required(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("name is required");
        }
        if self.email.trim().is_empty() {
            return Err("email is required");
        }
        if self.password.is_blank() {
            return Err("password is required");
        }
        Ok(())
    }
}

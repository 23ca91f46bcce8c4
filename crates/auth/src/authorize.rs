//! Claims-based authorization decision.
//!
//! - No IO
//! - No panics
//! - Never fails: every input, including an unreadable token, yields a decision.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::claims::{TokenClaims, TokenValidationError};
use crate::token::JwtValidator;
use crate::Role;

/// Why a request was denied.
///
/// Each variant has a stable code for logs and tests. Callers are shown a single
/// generic denial regardless of which variant applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    HeaderMissing,
    TokenMissing,
    TokenMalformed,
    TokenExpired,
    ClaimMissing,
    RoleNotRecognized,
    PrivilegedTarget,
    EmployeeForbidden,
}

impl DenialReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenialReason::HeaderMissing => "header_missing",
            DenialReason::TokenMissing => "token_missing",
            DenialReason::TokenMalformed => "token_malformed",
            DenialReason::TokenExpired => "token_expired",
            DenialReason::ClaimMissing => "claim_missing",
            DenialReason::RoleNotRecognized => "role_not_recognized",
            DenialReason::PrivilegedTarget => "privileged_target",
            DenialReason::EmployeeForbidden => "employee_forbidden",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            DenialReason::HeaderMissing => "Authorization header is missing.",
            DenialReason::TokenMissing => "Authorization token is missing.",
            DenialReason::TokenMalformed => "Invalid token.",
            DenialReason::TokenExpired => "Token has expired.",
            DenialReason::ClaimMissing => "Role claim is missing in token.",
            DenialReason::RoleNotRecognized => "Role claim is not recognized.",
            DenialReason::PrivilegedTarget => "Admins cannot access SuperAdmin or Admin data.",
            DenialReason::EmployeeForbidden => "Employees are not authorized.",
        }
    }
}

impl core::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl From<&TokenValidationError> for DenialReason {
    fn from(err: &TokenValidationError) -> Self {
        match err {
            TokenValidationError::Expired
            | TokenValidationError::NotYetValid
            | TokenValidationError::InvalidTimeWindow => DenialReason::TokenExpired,
            TokenValidationError::Malformed(_) => DenialReason::TokenMalformed,
            TokenValidationError::ClaimMissing(_) => DenialReason::ClaimMissing,
            TokenValidationError::RoleNotRecognized(_) => DenialReason::RoleNotRecognized,
        }
    }
}

/// Outcome of an authorization check. Transient; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuthorizationDecision {
    pub allowed: bool,
    pub reason: Option<DenialReason>,
}

impl AuthorizationDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: DenialReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }

    /// `Ok(())` when allowed, otherwise the denial reason.
    pub fn into_result(self) -> Result<(), DenialReason> {
        match self.reason {
            _ if self.allowed => Ok(()),
            Some(reason) => Err(reason),
            None => Err(DenialReason::TokenMalformed),
        }
    }
}

/// The caller of a request, as far as its bearer token could be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Authenticated(TokenClaims),
    Rejected(DenialReason),
}

impl Caller {
    /// Read the caller from a raw `Authorization` header value.
    ///
    /// The token is the last space-separated segment of the header, so both
    /// `Bearer <token>` and a bare token are accepted.
    pub fn from_authorization_header(
        header: Option<&str>,
        validator: &dyn JwtValidator,
        now: DateTime<Utc>,
    ) -> Self {
        let Some(header) = header else {
            return Caller::Rejected(DenialReason::HeaderMissing);
        };

        let token = header.split(' ').next_back().unwrap_or_default().trim();
        if token.is_empty() || token.eq_ignore_ascii_case("bearer") {
            return Caller::Rejected(DenialReason::TokenMissing);
        }

        match validator.validate(token, now) {
            Ok(claims) => Caller::Authenticated(claims),
            Err(e) => {
                tracing::debug!(error = %e, "bearer token rejected");
                Caller::Rejected(DenialReason::from(&e))
            }
        }
    }

    pub fn claims(&self) -> Option<&TokenClaims> {
        match self {
            Caller::Authenticated(claims) => Some(claims),
            Caller::Rejected(_) => None,
        }
    }
}

/// Decide whether a caller holding `caller_role` may act on a resource of `target_role`.
///
/// - SuperAdmin: always allowed.
/// - Admin: allowed only on Employee resources.
/// - Employee: never allowed.
pub fn decide(caller_role: Role, target_role: Role) -> AuthorizationDecision {
    match (caller_role, target_role) {
        (Role::SuperAdmin, _) => AuthorizationDecision::allow(),
        (Role::Admin, Role::Employee) => AuthorizationDecision::allow(),
        (Role::Admin, Role::SuperAdmin | Role::Admin) => {
            AuthorizationDecision::deny(DenialReason::PrivilegedTarget)
        }
        (Role::Employee, _) => AuthorizationDecision::deny(DenialReason::EmployeeForbidden),
    }
}

/// [`decide`] for a caller whose token may not have been readable.
pub fn decide_for(caller: &Caller, target_role: Role) -> AuthorizationDecision {
    match caller {
        Caller::Authenticated(claims) => decide(claims.role, target_role),
        Caller::Rejected(reason) => AuthorizationDecision::deny(*reason),
    }
}

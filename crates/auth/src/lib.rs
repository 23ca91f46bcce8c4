//! `warden-auth` — pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod roles;
pub mod token;
pub mod user;

pub use authorize::{AuthorizationDecision, Caller, DenialReason, decide, decide_for};
pub use claims::{TokenClaims, TokenValidationError, validate_claims};
pub use roles::{Role, UnknownRole};
pub use token::{Hs256Jwt, IssuedToken, JwtIssuer, JwtValidator, TokenIssueError};
pub use user::{PasswordSecret, ScopeRef, UserEntity, unset_timestamp};

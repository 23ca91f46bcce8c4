use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Directory role. Determines which scope attributes a user carries and which
/// authorization rules apply to it.
///
/// The wire form is the exact literal (`"SuperAdmin"`, `"Admin"`, `"Employee"`); it is
/// what the store writes into the `Type` tag and what tokens carry in the `role` claim.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    SuperAdmin,
    Admin,
    Employee,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("role not recognized: '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 3] = [Role::SuperAdmin, Role::Admin, Role::Employee];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SuperAdmin",
            Role::Admin => "Admin",
            Role::Employee => "Employee",
        }
    }

    /// Company, company id, and bucket topic are meaningful for Admin and Employee.
    pub fn has_company(&self) -> bool {
        !matches!(self, Role::SuperAdmin)
    }

    /// Site, zone, and role detail are meaningful for Employee only.
    pub fn has_site_scope(&self) -> bool {
        matches!(self, Role::Employee)
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SuperAdmin" => Ok(Role::SuperAdmin),
            "Admin" => Ok(Role::Admin),
            "Employee" => Ok(Role::Employee),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

use warden_auth::{Caller, Role, TokenClaims, decide_for};
use warden_core::DomainError;

/// Who is calling, as read from the request's bearer token.
///
/// Always present on routed requests; an unreadable or missing token is carried as a
/// rejected caller rather than failing the request early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    caller: Caller,
}

impl CallerContext {
    pub fn new(caller: Caller) -> Self {
        Self { caller }
    }

    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    pub fn claims(&self) -> Option<&TokenClaims> {
        self.caller.claims()
    }

    /// Require that the caller may act on resources of `target`.
    pub fn authorize(&self, target: Role) -> Result<(), DomainError> {
        decide_for(&self.caller, target).into_result().map_err(|reason| {
            tracing::warn!(
                reason = reason.code(),
                %target,
                subject = ?self.claims().map(|c| c.sub),
                "request denied"
            );
            DomainError::unauthorized(reason.code())
        })
    }

    /// Fail early when no usable token was presented.
    pub fn require_authenticated(&self) -> Result<&TokenClaims, DomainError> {
        match &self.caller {
            Caller::Authenticated(claims) => Ok(claims),
            Caller::Rejected(reason) => {
                tracing::warn!(reason = reason.code(), "request denied");
                Err(DomainError::unauthorized(reason.code()))
            }
        }
    }
}

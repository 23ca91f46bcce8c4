//! Credential service: email/password login issuing a signed bearer token.

use std::sync::Arc;

use chrono::Utc;

use warden_auth::{IssuedToken, JwtIssuer};
use warden_core::{DomainError, DomainResult};

use crate::directory::DirectoryService;
use crate::store::ColumnStore;

pub struct CredentialService<S = Arc<dyn ColumnStore>> {
    directory: Arc<DirectoryService<S>>,
    issuer: Arc<dyn JwtIssuer>,
}

impl<S: ColumnStore + Clone> CredentialService<S> {
    pub fn new(directory: Arc<DirectoryService<S>>, issuer: Arc<dyn JwtIssuer>) -> Self {
        Self { directory, issuer }
    }

    /// Verify `email`/`password` and issue a token for the matching user.
    ///
    /// Passwords are compared as stored, without hashing.
    pub async fn authenticate(&self, email: &str, password: &str) -> DomainResult<IssuedToken> {
        let user = self
            .directory
            .find_by_email(email)
            .await?
            .ok_or_else(|| DomainError::not_found("email not found"))?;

        if !user.password.matches(password) {
            tracing::info!(user_id = %user.id, "login rejected: password mismatch");
            return Err(DomainError::validation("passwords do not match"));
        }

        let token = self
            .issuer
            .issue(&user, Utc::now())
            .map_err(|e| DomainError::backend("token issuance failed", &e))?;

        tracing::info!(user_id = %user.id, role = %user.role, "login succeeded");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryColumnStore, Point};
    use chrono::Duration;
    use warden_auth::{Hs256Jwt, JwtValidator, Role, UserEntity};

    type Store = Arc<InMemoryColumnStore>;

    async fn setup() -> (CredentialService<Store>, Arc<Hs256Jwt>) {
        let store = Arc::new(InMemoryColumnStore::new());
        store
            .insert(
                Point::new("Companies", Utc::now())
                    .tag("CompanyId", "Acme")
                    .field("ShortId", "AC")
                    .field("Topic", "acme-topic"),
            )
            .unwrap();
        let directory = Arc::new(DirectoryService::new(store));
        directory
            .create(
                UserEntity::new(Role::Employee, "Eve", "a@x.com", "correct").with_company("Acme"),
                false,
            )
            .await
            .unwrap();

        let jwt = Arc::new(Hs256Jwt::new(b"credential-test-secret", "warden", "warden", Duration::minutes(30)));
        (CredentialService::new(directory, jwt.clone()), jwt)
    }

    #[tokio::test]
    async fn correct_password_issues_token_with_claims() {
        let (creds, jwt) = setup().await;
        let issued = creds.authenticate("a@x.com", "correct").await.unwrap();

        let claims = jwt.validate(&issued.token, Utc::now()).unwrap();
        assert_eq!(claims.role, Role::Employee);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.company_id, "AC");
        assert_eq!(claims.bucket, "acme-topic");
        assert_eq!(issued.expires_at, claims.expires_at);
    }

    #[tokio::test]
    async fn scenario_b_wrong_password() {
        let (creds, _) = setup().await;
        let err = creds.authenticate("a@x.com", "wrong").await.unwrap_err();
        assert_eq!(err, DomainError::Validation("passwords do not match".into()));
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        let (creds, _) = setup().await;
        let err = creds.authenticate("nobody@x.com", "correct").await.unwrap_err();
        assert_eq!(err, DomainError::NotFound("email not found".into()));
    }
}

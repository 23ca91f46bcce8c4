use std::sync::Arc;

use warden_auth::Hs256Jwt;
use warden_infra::store::StoreError;
use warden_infra::{ColumnStore, CredentialService, DirectoryService, ServiceConfig};

/// Long-lived services shared by every request. Read-only after start-up.
#[derive(Clone)]
pub struct AppServices {
    pub directory: Arc<DirectoryService>,
    pub credentials: Arc<CredentialService>,
    pub jwt: Arc<Hs256Jwt>,
}

impl AppServices {
    pub fn new(store: Arc<dyn ColumnStore>, jwt: Hs256Jwt) -> Self {
        let jwt = Arc::new(jwt);
        let directory = Arc::new(DirectoryService::new(store));
        let credentials = Arc::new(CredentialService::new(directory.clone(), jwt.clone()));
        Self {
            directory,
            credentials,
            jwt,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, StoreError> {
        let store = config.store.connect()?;
        tracing::info!(store = ?config.store, issuer = %config.jwt.issuer, "services configured");
        Ok(Self::new(store, config.jwt.codec()))
    }
}

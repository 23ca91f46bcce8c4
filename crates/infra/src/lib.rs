//! Infrastructure layer: column store, record codec, directory and credential services,
//! configuration.

pub mod codec;
pub mod config;
pub mod credentials;
pub mod directory;
pub mod resolver;
pub mod sequencer;
pub mod store;

pub use config::{ConfigError, ServiceConfig, StoreConfig};
pub use credentials::CredentialService;
pub use directory::DirectoryService;
pub use store::{ColumnStore, InMemoryColumnStore, InfluxColumnStore};

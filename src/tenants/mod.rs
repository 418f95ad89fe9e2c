mod config;
mod directory;
mod store;

pub use config::{
    LlmSettings, SessionOverrides, StoreLocation, StoreSettings, TenantConfig, TenantKind,
    WhatsAppCredentials, normalize_contact,
};
pub use directory::{CredentialRotation, TenantDirectory};
pub use store::{InMemoryTenantStore, SqliteTenantStore, TenantStore};

//! # Data Models
//!
//! SeaORM entities for integrations, activity logs and documents, plus the
//! closed provider type enumeration shared across the crate.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod activity_log;
pub mod document;
pub mod integration;
pub mod provider_type;

pub use activity_log::Entity as ActivityLog;
pub use document::Entity as Document;
pub use integration::{ConnectionState, Entity as Integration};
pub use provider_type::{ProviderType, UnknownProviderType};

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "kb-integrations".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

//! Integration entity model
//!
//! One row per (team, provider type) connection. `config` stays an open JSON
//! map in storage; adapters narrow it into typed config at their boundary.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

use super::provider_type::{ProviderType, UnknownProviderType};

/// Config key marking an integration whose OAuth flow has not completed.
pub const OAUTH_PENDING_KEY: &str = "oauth_pending";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "integrations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning team, immutable
    pub team_id: Uuid,

    /// Wire name of the provider type, immutable after creation
    pub integration_type: String,

    /// Human label, mutable
    pub integration_name: String,

    /// Provider-specific credentials and settings
    #[sea_orm(column_type = "JsonBinary")]
    pub config: JsonValue,

    pub is_active: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Connection state reported to the UI after an OAuth popup closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Waiting for an OAuth flow to complete (or one ended in failure)
    Pending,
    /// Credentials stored and the integration is active
    Connected,
    /// Configured but switched off
    Disconnected,
}

impl Model {
    pub fn provider_type(&self) -> Result<ProviderType, UnknownProviderType> {
        self.integration_type.parse()
    }

    pub fn is_oauth_pending(&self) -> bool {
        self.config
            .get(OAUTH_PENDING_KEY)
            .and_then(JsonValue::as_bool)
            .unwrap_or(false)
    }

    pub fn connection_state(&self) -> ConnectionState {
        if self.is_active {
            ConnectionState::Connected
        } else if self.is_oauth_pending() {
            ConnectionState::Pending
        } else {
            ConnectionState::Disconnected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn integration(config: JsonValue, is_active: bool) -> Model {
        let now = chrono::Utc::now().into();
        Model {
            id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            integration_type: "notion".to_string(),
            integration_name: "Wiki".to_string(),
            config,
            is_active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn connection_state_follows_active_flag_and_pending_marker() {
        assert_eq!(
            integration(json!({"oauth_pending": true}), false).connection_state(),
            ConnectionState::Pending
        );
        assert_eq!(
            integration(json!({"access_token": "t"}), true).connection_state(),
            ConnectionState::Connected
        );
        assert_eq!(
            integration(json!({"access_token": "t"}), false).connection_state(),
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn provider_type_rejects_unknown_values() {
        let mut model = integration(json!({}), false);
        assert_eq!(model.provider_type(), Ok(ProviderType::Notion));
        model.integration_type = "myspace".to_string();
        assert!(model.provider_type().is_err());
    }
}

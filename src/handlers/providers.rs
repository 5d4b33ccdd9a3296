//! # Providers API Handlers

use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::providers::ProviderMetadata;
use crate::server::AppState;

/// Response containing the registered providers
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProvidersResponse {
    /// Sorted by provider name
    pub providers: Vec<ProviderMetadata>,
}

/// List registered provider adapters with their auth type and actions
#[utoipa::path(
    get,
    path = "/providers",
    responses(
        (status = 200, description = "Registered providers", body = ProvidersResponse, example = json!({
            "providers": [
                {
                    "name": "discord",
                    "display_name": "Discord",
                    "auth_type": "webhook_url",
                    "actions": ["test_connection", "send_message"]
                }
            ]
        }))
    ),
    tag = "providers"
)]
pub async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        providers: state.registry.list_metadata(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::ProviderType;
    use std::sync::Arc;

    #[tokio::test]
    async fn lists_every_provider_sorted_by_name() {
        let db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
        let state = AppState::from_config(Arc::new(AppConfig::default()), db).unwrap();

        let Json(response) = list_providers(State(state)).await;

        let names: Vec<ProviderType> = response.providers.iter().map(|p| p.name).collect();
        let mut expected = ProviderType::ALL.to_vec();
        expected.sort_by_key(|p| p.as_str());
        assert_eq!(names, expected);

        let github = response
            .providers
            .iter()
            .find(|p| p.name == ProviderType::Github)
            .unwrap();
        assert!(github.actions.contains(&"fetch_issues".to_string()));
    }
}

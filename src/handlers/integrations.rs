//! # Integration Lifecycle Handlers
//!
//! Create or reconnect, inspect, activate, deactivate and delete a team's
//! integrations.

use axum::{
    extract::{Path, State, rejection::{JsonRejection, PathRejection}},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue, json};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dispatcher::ActionResult;
use crate::error::{ApiError, ErrorType};
use crate::models::integration::{ConnectionState, Model as Integration, OAUTH_PENDING_KEY};
use crate::models::ProviderType;
use crate::providers::config::ProviderConfig;
use crate::providers::{Action, ErrorKind};
use crate::repositories::NewIntegration;
use crate::server::AppState;

/// Body of `POST /integrations`
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntegrationRequest {
    pub team_id: Uuid,
    /// Provider wire name, e.g. `slack`
    pub integration_type: String,
    /// Defaults to the provider display name
    pub integration_name: Option<String>,
    /// Provider config. OAuth providers keep only settings such as a Drive `folder_id`
    #[schema(value_type = Option<Object>)]
    pub config: Option<JsonValue>,
}

/// Integration as exposed over HTTP. Credentials are never returned.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationView {
    pub id: Uuid,
    pub team_id: Uuid,
    pub integration_type: String,
    pub integration_name: String,
    pub is_active: bool,
    pub connection_state: ConnectionState,
    pub created_at: String,
    pub updated_at: String,
    /// Where the UI opens its OAuth popup while the integration is pending
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_url: Option<String>,
}

impl IntegrationView {
    fn build(state: &AppState, model: Integration) -> Self {
        let connect_url = match (model.connection_state(), model.provider_type()) {
            (ConnectionState::Connected, _) => None,
            (_, Ok(provider)) if provider.uses_oauth() => state
                .oauth
                .connect_url(provider, model.id)
                .map(|url| url.to_string()),
            _ => None,
        };
        Self {
            id: model.id,
            team_id: model.team_id,
            connection_state: model.connection_state(),
            is_active: model.is_active,
            integration_type: model.integration_type,
            integration_name: model.integration_name,
            created_at: model.created_at.to_rfc3339(),
            updated_at: model.updated_at.to_rfc3339(),
            connect_url,
        }
    }
}

/// Create an integration, or reconnect the team's existing one for the provider
#[utoipa::path(
    post,
    path = "/integrations",
    request_body = CreateIntegrationRequest,
    responses(
        (status = 200, description = "Integration saved", body = IntegrationView),
        (status = 400, description = "Unknown provider or invalid config", body = ApiError),
        (status = 500, description = "Store failure", body = ApiError)
    ),
    tag = "integrations"
)]
pub async fn create_integration(
    State(state): State<AppState>,
    body: Result<Json<CreateIntegrationRequest>, JsonRejection>,
) -> Result<Json<IntegrationView>, ApiError> {
    let Json(request) = body?;
    let provider: ProviderType = request
        .integration_type
        .parse()
        .map_err(|err: crate::models::UnknownProviderType| ApiError::bad_request(&err.to_string()))?;

    let config = if provider.uses_oauth() {
        pending_config(provider, request.config.as_ref())
    } else {
        let config = request
            .config
            .ok_or_else(|| ApiError::bad_request("config is required"))?;
        ProviderConfig::parse(provider, &config)?;
        config
    };

    let display_name = request
        .integration_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| provider.display_name().to_string());

    let saved = state
        .store
        .save_integration(NewIntegration {
            team_id: request.team_id,
            provider_type: provider,
            display_name,
            config: Some(config),
        })
        .await?;

    info!(integration_id = %saved.id, team_id = %saved.team_id, provider = %provider, "Integration saved");
    Ok(Json(IntegrationView::build(&state, saved)))
}

/// Fetch one integration and its connection state
#[utoipa::path(
    get,
    path = "/integrations/{id}",
    params(("id" = Uuid, Path, description = "Integration id")),
    responses(
        (status = 200, description = "Integration", body = IntegrationView),
        (status = 404, description = "Integration not found", body = ApiError)
    ),
    tag = "integrations"
)]
pub async fn get_integration(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<IntegrationView>, ApiError> {
    let Path(id) = path?;
    let integration = load(&state, id).await?;
    Ok(Json(IntegrationView::build(&state, integration)))
}

/// Run `test_connection` and activate the integration when it passes
#[utoipa::path(
    post,
    path = "/integrations/{id}/activate",
    params(("id" = Uuid, Path, description = "Integration id")),
    responses(
        (status = 200, description = "Integration activated", body = IntegrationView),
        (status = 400, description = "Config is incomplete", body = ApiError),
        (status = 404, description = "Integration not found", body = ApiError),
        (status = 502, description = "Provider rejected the credentials", body = ApiError)
    ),
    tag = "integrations"
)]
pub async fn activate_integration(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<IntegrationView>, ApiError> {
    let Path(id) = path?;
    let integration = load(&state, id).await?;

    let result = state
        .dispatcher
        .run(&integration, &Action::TestConnection, &JsonValue::Null)
        .await;
    if !result.success {
        return Err(connection_test_failed(result));
    }

    let activated = state.store.activate_integration(id, None).await?;
    info!(integration_id = %id, "Integration activated");
    Ok(Json(IntegrationView::build(&state, activated)))
}

/// Switch an integration off, keeping its config
#[utoipa::path(
    post,
    path = "/integrations/{id}/deactivate",
    params(("id" = Uuid, Path, description = "Integration id")),
    responses(
        (status = 200, description = "Integration deactivated", body = IntegrationView),
        (status = 404, description = "Integration not found", body = ApiError)
    ),
    tag = "integrations"
)]
pub async fn deactivate_integration(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<IntegrationView>, ApiError> {
    let Path(id) = path?;
    let integration = state.store.deactivate_integration(id).await?;
    info!(integration_id = %id, "Integration deactivated");
    Ok(Json(IntegrationView::build(&state, integration)))
}

/// Delete an integration permanently
#[utoipa::path(
    delete,
    path = "/integrations/{id}",
    params(("id" = Uuid, Path, description = "Integration id")),
    responses(
        (status = 204, description = "Integration deleted"),
        (status = 404, description = "Integration not found", body = ApiError)
    ),
    tag = "integrations"
)]
pub async fn delete_integration(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = path?;
    if !state.store.delete_integration(id).await? {
        return Err(ApiError::not_found(&format!("Integration not found: {id}")));
    }
    info!(integration_id = %id, "Integration deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// List a team's integrations
#[utoipa::path(
    get,
    path = "/teams/{teamId}/integrations",
    params(("teamId" = Uuid, Path, description = "Team id")),
    responses(
        (status = 200, description = "Integrations of the team", body = [IntegrationView])
    ),
    tag = "integrations"
)]
pub async fn list_team_integrations(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<IntegrationView>>, ApiError> {
    let Path(team_id) = path?;
    let integrations = state.store.list_integrations(team_id).await?;
    Ok(Json(
        integrations
            .into_iter()
            .map(|integration| IntegrationView::build(&state, integration))
            .collect(),
    ))
}

/// Settings a caller may choose before an OAuth flow; credentials are
/// never accepted here.
fn oauth_settings(provider: ProviderType) -> &'static [&'static str] {
    match provider {
        ProviderType::GoogleDrive => &["folder_id"],
        _ => &[],
    }
}

fn pending_config(provider: ProviderType, supplied: Option<&JsonValue>) -> JsonValue {
    let mut config = JsonMap::new();
    config.insert(OAUTH_PENDING_KEY.to_string(), JsonValue::Bool(true));
    for key in oauth_settings(provider) {
        let value = supplied
            .and_then(|config| config.get(*key))
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(value) = value {
            config.insert(key.to_string(), JsonValue::String(value.to_string()));
        }
    }
    JsonValue::Object(config)
}

async fn load(state: &AppState, id: Uuid) -> Result<Integration, ApiError> {
    state
        .store
        .get_integration(id)
        .await?
        .ok_or_else(|| ApiError::not_found(&format!("Integration not found: {id}")))
}

fn connection_test_failed(result: ActionResult) -> ApiError {
    let kind = result.error_kind.unwrap_or(ErrorKind::Upstream);
    ErrorType::for_kind(kind)
        .with_message(&format!("Connection test failed: {}", result.message))
        .with_details(json!({ "kind": kind }))
}

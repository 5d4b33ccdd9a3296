//! # Google Drive Handlers
//!
//! `POST /fetch-google-drive` lists a folder directly, outside the action
//! dispatcher, using either an integration's token or the server API key.

use axum::{
    extract::{State, rejection::JsonRejection},
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::ProviderType;
use crate::providers::config::{GoogleDriveConfig, narrow};
use crate::providers::google_drive::DriveFileEntry;
use crate::server::AppState;

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FetchDriveRequest {
    /// Folder to list; defaults to the integration's `folder_id`
    pub folder_id: Option<String>,
    /// Integration whose token is used; the server API key otherwise
    pub integration_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FetchDriveResponse {
    pub files: Vec<DriveFileEntry>,
    pub total_files: usize,
}

/// List the files of a Google Drive folder
#[utoipa::path(
    post,
    path = "/fetch-google-drive",
    request_body = FetchDriveRequest,
    responses(
        (status = 200, description = "Folder listing", body = FetchDriveResponse),
        (status = 400, description = "Missing folderId or not a Google Drive integration", body = ApiError),
        (status = 404, description = "Integration not found", body = ApiError),
        (status = 500, description = "No Google credential configured", body = ApiError),
        (status = 502, description = "Google Drive API error", body = ApiError)
    ),
    tag = "google_drive"
)]
pub async fn fetch_google_drive(
    State(state): State<AppState>,
    body: Result<Json<FetchDriveRequest>, JsonRejection>,
) -> Result<Json<FetchDriveResponse>, ApiError> {
    let Json(request) = body?;

    let config = match request.integration_id {
        Some(id) => {
            let integration = state
                .store
                .get_integration(id)
                .await?
                .ok_or_else(|| ApiError::not_found(&format!("Integration not found: {id}")))?;
            if integration.integration_type != ProviderType::GoogleDrive.as_str() {
                return Err(ApiError::bad_request(&format!(
                    "Integration {id} is not a Google Drive integration"
                )));
            }
            Some(narrow::<GoogleDriveConfig>(
                ProviderType::GoogleDrive,
                &integration.config,
            )?)
        }
        None => None,
    };

    let folder_id = request
        .folder_id
        .filter(|id| !id.trim().is_empty())
        .or_else(|| config.as_ref().and_then(|c| c.folder_id.clone()))
        .ok_or_else(|| ApiError::bad_request("folderId is required"))?;

    let auth = state.drive.auth_for(config.as_ref())?;
    let files = state.drive.list_folder(&auth, &folder_id).await?;
    info!(folder_id = %folder_id, files = files.len(), "Listed Google Drive folder");

    Ok(Json(FetchDriveResponse {
        total_files: files.len(),
        files,
    }))
}

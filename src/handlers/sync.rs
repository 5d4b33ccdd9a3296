//! # Sync Handlers

use axum::{
    extract::{Path, State, rejection::PathRejection},
    response::Json,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::server::AppState;
use crate::sync::SyncReport;

/// Pull documents from every active integration of a team
///
/// Individual integration failures are reported in the body; only a store
/// failure while listing integrations fails the request.
#[utoipa::path(
    post,
    path = "/teams/{teamId}/sync",
    params(("teamId" = Uuid, Path, description = "Team id")),
    responses(
        (status = 200, description = "Sync finished", body = SyncReport),
        (status = 400, description = "Invalid team id", body = ApiError),
        (status = 500, description = "Store failure", body = ApiError)
    ),
    tag = "sync"
)]
pub async fn sync_team(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<SyncReport>, ApiError> {
    let Path(team_id) = path?;
    let report = state.sync.sync_team(team_id).await?;
    Ok(Json(report))
}

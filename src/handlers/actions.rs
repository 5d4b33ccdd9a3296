//! # Action Handlers
//!
//! `POST /integration-action`: the single entry point through which the UI
//! runs provider actions.

use axum::{
    extract::{State, rejection::JsonRejection},
    response::Json,
};

use crate::dispatcher::{ActionRequest, ActionResult};
use crate::error::ApiError;
use crate::server::AppState;

/// Run one action against an integration
///
/// Every dispatched outcome, including provider failures, returns 200 and is
/// distinguished by the `success` flag.
#[utoipa::path(
    post,
    path = "/integration-action",
    request_body = ActionRequest,
    responses(
        (status = 200, description = "Action dispatched; see `success`", body = ActionResult, example = json!({
            "success": true,
            "message": "Message sent to Slack",
            "result": {"kind": "delivered", "status": 200}
        })),
        (status = 400, description = "Missing integrationId or action", body = ApiError),
        (status = 404, description = "Integration not found", body = ApiError),
        (status = 500, description = "Store failure", body = ApiError)
    ),
    tag = "actions"
)]
pub async fn integration_action(
    State(state): State<AppState>,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<ActionResult>, ApiError> {
    let Json(request) = body?;
    let result = state.dispatcher.dispatch(request).await?;
    Ok(Json(result))
}

//! # OAuth Handlers
//!
//! Browser-facing `GET /{provider}-oauth` endpoints. Without a `code` they
//! redirect to the provider's consent screen; with one they exchange it and
//! answer with the page that notifies the opener window.

use axum::{
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};

use crate::error::ApiError;
use crate::models::ProviderType;
use crate::oauth::{OAuthOutcome, OAuthQuery, page};
use crate::server::AppState;

async fn handle(
    state: AppState,
    provider: ProviderType,
    query: Result<Query<OAuthQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let outcome = state.oauth.handle(provider, query).await?;
    Ok(outcome_response(&outcome))
}

/// Map a flow outcome onto the HTTP response the browser receives.
pub fn outcome_response(outcome: &OAuthOutcome) -> Response {
    match outcome {
        OAuthOutcome::Redirect(url) => {
            (StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response()
        }
        OAuthOutcome::Connected { .. } | OAuthOutcome::Failed { .. } => {
            let status = match outcome {
                OAuthOutcome::Connected { .. } => StatusCode::OK,
                _ => StatusCode::BAD_REQUEST,
            };
            let body = page::render(outcome).unwrap_or_default();
            (status, Html(body)).into_response()
        }
    }
}

/// Google Drive / Workspace OAuth
#[utoipa::path(
    get,
    path = "/google-oauth",
    params(OAuthQuery),
    responses(
        (status = 302, description = "Redirect to Google consent screen"),
        (status = 200, description = "Connected; HTML page notifies the opener", content_type = "text/html"),
        (status = 400, description = "Exchange failed or bad parameters"),
        (status = 404, description = "Integration not found", body = ApiError)
    ),
    tag = "oauth"
)]
pub async fn google_oauth(
    State(state): State<AppState>,
    query: Result<Query<OAuthQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    handle(state, ProviderType::GoogleDrive, query).await
}

/// Notion OAuth
#[utoipa::path(
    get,
    path = "/notion-oauth",
    params(OAuthQuery),
    responses(
        (status = 302, description = "Redirect to Notion consent screen"),
        (status = 200, description = "Connected; HTML page notifies the opener", content_type = "text/html"),
        (status = 400, description = "Exchange failed or bad parameters"),
        (status = 404, description = "Integration not found", body = ApiError)
    ),
    tag = "oauth"
)]
pub async fn notion_oauth(
    State(state): State<AppState>,
    query: Result<Query<OAuthQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    handle(state, ProviderType::Notion, query).await
}

/// GitHub OAuth
#[utoipa::path(
    get,
    path = "/github-oauth",
    params(OAuthQuery),
    responses(
        (status = 302, description = "Redirect to GitHub consent screen"),
        (status = 200, description = "Connected; HTML page notifies the opener", content_type = "text/html"),
        (status = 400, description = "Exchange failed or bad parameters"),
        (status = 404, description = "Integration not found", body = ApiError)
    ),
    tag = "oauth"
)]
pub async fn github_oauth(
    State(state): State<AppState>,
    query: Result<Query<OAuthQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    handle(state, ProviderType::Github, query).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn redirect_sets_location() {
        let url = url::Url::parse("https://github.com/login/oauth/authorize?state=abc").unwrap();
        let response = outcome_response(&OAuthOutcome::Redirect(url.clone()));
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            url.as_str()
        );
    }

    #[test]
    fn terminal_pages_are_html() {
        let connected = outcome_response(&OAuthOutcome::Connected {
            provider: ProviderType::Notion,
            integration_id: Uuid::new_v4(),
            identity: Some("Acme".into()),
        });
        assert_eq!(connected.status(), StatusCode::OK);
        assert!(
            connected
                .headers()
                .get(header::CONTENT_TYPE)
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );

        let failed = outcome_response(&OAuthOutcome::Failed {
            provider: ProviderType::Notion,
            integration_id: None,
            message: "access_denied".into(),
        });
        assert_eq!(failed.status(), StatusCode::BAD_REQUEST);
    }
}

//! # Error Handling
//!
//! Unified problem+json error responses for the integrations API, carrying
//! the request trace id so client reports can be matched to server logs.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::dispatcher::DispatchError;
use crate::oauth::OAuthError;
use crate::providers::{ErrorKind, ProviderError};
use crate::repositories::StoreError;
use crate::telemetry;

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Correlation trace ID for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: &str) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
            trace_id: Some(
                telemetry::current_trace_id()
                    .unwrap_or_else(telemetry::generate_trace_id)
                    .into_boxed_str(),
            ),
        }
    }

    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    pub fn bad_request(message: &str) -> Self {
        ErrorType::BadRequest.with_message(message)
    }

    pub fn not_found(message: &str) -> Self {
        ErrorType::NotFound.with_message(message)
    }

    fn internal() -> Self {
        ErrorType::InternalServerError.with_message("An internal error occurred")
    }
}

fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;

    let runtime_err = match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    runtime_err
        .as_database_error()
        .is_some_and(|db_error| db_error.is_unique_violation())
}

/// Standard error types with predefined status codes
#[derive(Debug, Clone, Copy, Error)]
pub enum ErrorType {
    #[error("Bad Request")]
    BadRequest,
    #[error("Not Found")]
    NotFound,
    #[error("Conflict")]
    Conflict,
    #[error("Internal Server Error")]
    InternalServerError,
    #[error("Bad Gateway")]
    BadGateway,
    #[error("Service Unavailable")]
    ServiceUnavailable,
}

impl ErrorType {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorType::BadRequest => StatusCode::BAD_REQUEST,
            ErrorType::NotFound => StatusCode::NOT_FOUND,
            ErrorType::Conflict => StatusCode::CONFLICT,
            ErrorType::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorType::BadGateway => StatusCode::BAD_GATEWAY,
            ErrorType::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// SCREAMING_SNAKE_CASE code sent in the `code` field
    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorType::BadRequest => "VALIDATION_FAILED",
            ErrorType::NotFound => "NOT_FOUND",
            ErrorType::Conflict => "CONFLICT",
            ErrorType::InternalServerError => "INTERNAL_SERVER_ERROR",
            ErrorType::BadGateway => "PROVIDER_ERROR",
            ErrorType::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }

    /// Caller mistakes are 400, server misconfiguration 500, upstream trouble 502.
    pub fn for_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidConfig
            | ErrorKind::InvalidPayload
            | ErrorKind::UnsupportedAction
            | ErrorKind::UnsupportedProvider => ErrorType::BadRequest,
            ErrorKind::Configuration => ErrorType::InternalServerError,
            ErrorKind::Upstream | ErrorKind::Network | ErrorKind::Timeout => ErrorType::BadGateway,
        }
    }

    pub fn with_message(self, message: &str) -> ApiError {
        ApiError::new(self.status_code(), self.error_code(), message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );
        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<ErrorType> for ApiError {
    fn from(error_type: ErrorType) -> Self {
        error_type.with_message(&error_type.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);
        Self::internal()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err.body_text()),
            JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err.body_text()),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };
        Self::bad_request(&message)
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(&format!("Invalid path parameter: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(&format!("Invalid query parameter: {}", rejection.body_text()))
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        if is_unique_violation(&error) {
            tracing::debug!(?error, "Unique constraint violation detected");
            return ErrorType::Conflict.with_message("Resource already exists");
        }

        match error {
            sea_orm::DbErr::RecordNotFound(record) => {
                Self::not_found(&format!("Record not found: {}", record))
            }
            sea_orm::DbErr::Conn(connection_err) => {
                tracing::error!("Database connection error: {:?}", connection_err);
                ErrorType::ServiceUnavailable.with_message("Database service unavailable")
            }
            other => {
                tracing::error!("Database error: {:?}", other);
                ErrorType::InternalServerError.with_message("Database error occurred")
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::IntegrationNotFound(id) => {
                Self::not_found(&format!("Integration not found: {id}"))
            }
            StoreError::Database(db) => db.into(),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::InvalidRequest(message) => Self::bad_request(&message),
            DispatchError::NotFound(id) => Self::not_found(&format!("Integration not found: {id}")),
            DispatchError::Store(store) => store.into(),
        }
    }
}

/// Provider failures carry their [`ErrorKind`] in `details`.
impl From<ProviderError> for ApiError {
    fn from(error: ProviderError) -> Self {
        if let Some(detail) = error.operator_detail() {
            tracing::error!(error = %error, detail, "Provider is not configured");
        }
        let kind = error.kind();
        ErrorType::for_kind(kind)
            .with_message(&error.to_string())
            .with_details(serde_json::json!({ "kind": kind }))
    }
}

impl From<OAuthError> for ApiError {
    fn from(error: OAuthError) -> Self {
        match error {
            OAuthError::IntegrationNotFound(_) => Self::not_found(&error.to_string()),
            OAuthError::MissingIntegrationId
            | OAuthError::InvalidIntegrationId(_)
            | OAuthError::ProviderMismatch { .. }
            | OAuthError::NotOAuthProvider(_)
            | OAuthError::InvalidParameter { .. } => Self::bad_request(&error.to_string()),
            OAuthError::NotConfigured { ref details, .. } => {
                tracing::error!(error = %error, details = %details, "OAuth provider is not configured");
                ErrorType::InternalServerError.with_message(&error.to_string())
            }
            OAuthError::Rejected { .. } => ErrorType::BadGateway.with_message(&error.to_string()),
            OAuthError::Upstream(provider) => provider.into(),
            OAuthError::Store(store) => store.into(),
        }
    }
}

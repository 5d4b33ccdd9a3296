//! # Server Configuration
//!
//! Application state, router and OpenAPI document for the integrations API.

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderName, Method, header},
    middleware,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::dispatcher::ActionDispatcher;
use crate::handlers;
use crate::oauth::OAuthFlow;
use crate::providers::Registry;
use crate::providers::google_drive::GoogleDriveAdapter;
use crate::providers::http::{build_client, build_oauth_client};
use crate::repositories::{DbStore, Store};
use crate::sync::SyncOrchestrator;
use crate::telemetry;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub store: Arc<dyn Store>,
    pub registry: Arc<Registry>,
    pub dispatcher: ActionDispatcher,
    pub oauth: Arc<OAuthFlow>,
    pub sync: SyncOrchestrator,
    /// Also registered in `registry`; kept typed for direct folder listing
    pub drive: Arc<GoogleDriveAdapter>,
}

impl AppState {
    /// Assemble state from pre-built services. `drive` replaces any Google
    /// Drive adapter already in `registry`.
    pub fn new(
        config: Arc<AppConfig>,
        db: DatabaseConnection,
        store: Arc<dyn Store>,
        mut registry: Registry,
        drive: Arc<GoogleDriveAdapter>,
        oauth: OAuthFlow,
    ) -> Self {
        registry.register(drive.clone());
        let registry = Arc::new(registry);
        let dispatcher = ActionDispatcher::new(store.clone(), registry.clone(), config.action_timeout());
        let sync = SyncOrchestrator::new(store.clone(), dispatcher.clone(), config.sync_concurrency);

        Self {
            config,
            db,
            store,
            registry,
            dispatcher,
            oauth: Arc::new(oauth),
            sync,
            drive,
        }
    }

    /// Production wiring: real provider endpoints, shared HTTP clients.
    pub fn from_config(config: Arc<AppConfig>, db: DatabaseConnection) -> Result<Self, reqwest::Error> {
        let http = build_client(config.http_timeout())?;
        let token_http = build_oauth_client(config.http_timeout())?;
        let store: Arc<dyn Store> = Arc::new(DbStore::new(Arc::new(db.clone())));

        let registry = Registry::from_config(&config, http.clone());
        let drive = Arc::new(GoogleDriveAdapter::new(
            http.clone(),
            config.google_api_key.clone(),
        ));
        let oauth = OAuthFlow::from_config(store.clone(), &config, http, token_http);

        Ok(Self::new(config, db, store, registry, drive, oauth))
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ]);

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/providers", get(handlers::providers::list_providers))
        .route(
            "/integration-action",
            post(handlers::actions::integration_action),
        )
        .route("/google-oauth", get(handlers::oauth::google_oauth))
        .route("/notion-oauth", get(handlers::oauth::notion_oauth))
        .route("/github-oauth", get(handlers::oauth::github_oauth))
        .route(
            "/fetch-google-drive",
            post(handlers::google_drive::fetch_google_drive),
        )
        .route(
            "/integrations",
            post(handlers::integrations::create_integration),
        )
        .route(
            "/integrations/{id}",
            get(handlers::integrations::get_integration)
                .delete(handlers::integrations::delete_integration),
        )
        .route(
            "/integrations/{id}/activate",
            post(handlers::integrations::activate_integration),
        )
        .route(
            "/integrations/{id}/deactivate",
            post(handlers::integrations::deactivate_integration),
        )
        .route(
            "/teams/{teamId}/integrations",
            get(handlers::integrations::list_team_integrations),
        )
        .route("/teams/{teamId}/sync", post(handlers::sync::sync_team))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(middleware::from_fn(telemetry::trace_context)),
        )
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let addr = config.bind_addr()?;
    let profile = config.profile.clone();
    let state = AppState::from_config(Arc::new(config), db)?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::providers::list_providers,
        crate::handlers::actions::integration_action,
        crate::handlers::oauth::google_oauth,
        crate::handlers::oauth::notion_oauth,
        crate::handlers::oauth::github_oauth,
        crate::handlers::google_drive::fetch_google_drive,
        crate::handlers::integrations::create_integration,
        crate::handlers::integrations::get_integration,
        crate::handlers::integrations::activate_integration,
        crate::handlers::integrations::deactivate_integration,
        crate::handlers::integrations::delete_integration,
        crate::handlers::integrations::list_team_integrations,
        crate::handlers::sync::sync_team,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::ConnectionState,
            crate::models::ProviderType,
            crate::handlers::HealthStatus,
            crate::handlers::providers::ProvidersResponse,
            crate::handlers::google_drive::FetchDriveRequest,
            crate::handlers::google_drive::FetchDriveResponse,
            crate::handlers::integrations::CreateIntegrationRequest,
            crate::handlers::integrations::IntegrationView,
            crate::dispatcher::ActionRequest,
            crate::dispatcher::ActionResult,
            crate::providers::ActionData,
            crate::providers::ErrorKind,
            crate::providers::ProviderMetadata,
            crate::providers::AuthType,
            crate::normalization::NormalizedDocument,
            crate::sync::SyncReport,
            crate::sync::IntegrationOutcome,
            crate::sync::SyncFailure,
            crate::sync::SyncStatus,
            crate::error::ApiError,
        )
    ),
    tags(
        (name = "actions", description = "Provider actions"),
        (name = "oauth", description = "OAuth connection flow"),
        (name = "integrations", description = "Integration lifecycle"),
        (name = "sync", description = "Document sync"),
    ),
    info(
        title = "Knowledge Base Integrations API",
        description = "Provider integrations, actions, OAuth and document sync",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;

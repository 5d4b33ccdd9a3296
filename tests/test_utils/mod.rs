//! Test utilities for database and service setup.
//!
//! In-memory SQLite with all migrations applied, plus helpers that build
//! the core services against `wiremock` servers.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use kb_integrations::config::AppConfig;
use kb_integrations::dispatcher::ActionDispatcher;
use kb_integrations::models::ProviderType;
use kb_integrations::models::integration::Model as Integration;
use kb_integrations::providers::Registry;
use kb_integrations::repositories::{DbStore, NewIntegration, Store};
use migration::{Migrator, MigratorTrait};
use reqwest::Client;
use sea_orm::{Database, DatabaseConnection};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Store over a fresh in-memory database.
pub async fn setup_store() -> Result<(DatabaseConnection, Arc<dyn Store>)> {
    let db = setup_test_db().await?;
    let store: Arc<dyn Store> = Arc::new(DbStore::new(Arc::new(db.clone())));
    Ok((db, store))
}

pub fn http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("test http client")
}

/// Config whose public base URL points at `base` (usually a mock server).
pub fn test_config(base: &str) -> AppConfig {
    AppConfig {
        public_base_url: base.trim_end_matches('/').to_string(),
        database_url: "sqlite::memory:".to_string(),
        action_timeout_secs: 5,
        ..AppConfig::default()
    }
}

pub fn dispatcher(store: Arc<dyn Store>, registry: Registry) -> ActionDispatcher {
    ActionDispatcher::new(store, Arc::new(registry), Duration::from_secs(5))
}

/// Create an integration and optionally activate it.
pub async fn insert_integration(
    store: &Arc<dyn Store>,
    team_id: Uuid,
    provider: ProviderType,
    config: JsonValue,
    active: bool,
) -> Result<Integration> {
    let saved = store
        .save_integration(NewIntegration {
            team_id,
            provider_type: provider,
            display_name: provider.display_name().to_string(),
            config: Some(config),
        })
        .await?;
    if active {
        return Ok(store.activate_integration(saved.id, None).await?);
    }
    Ok(saved)
}

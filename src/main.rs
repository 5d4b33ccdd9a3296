//! # Integrations Service Entry Point
//!
//! ```bash
//! kb-integrations            # migrate, then serve
//! kb-integrations serve
//! kb-integrations migrate
//! kb-integrations sync --team <uuid>
//! ```

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kb_integrations::{
    config::ConfigLoader,
    db::init_pool,
    migration::{Migrator, MigratorTrait},
    server::{AppState, run_server},
    telemetry,
};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "kb-integrations", version, about = "Knowledge base integrations service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations and start the HTTP server
    Serve,
    /// Apply pending migrations and exit
    Migrate,
    /// Sync one team's active integrations and print the report
    Sync {
        #[arg(long)]
        team: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new().load()?;
    telemetry::init_tracing(&config)?;
    if let Ok(redacted) = config.redacted_json() {
        tracing::info!(profile = %config.profile, config = %redacted, "Configuration loaded");
    }

    let db = init_pool(&config).await?;
    Migrator::up(&db, None)
        .await
        .context("Failed to apply database migrations")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(config, db).await,
        Command::Migrate => {
            tracing::info!("Migrations applied");
            Ok(())
        }
        Command::Sync { team } => {
            let state = AppState::from_config(Arc::new(config), db)?;
            let report = state.sync.sync_team(team).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

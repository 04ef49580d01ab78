use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use finboard_api::{ApiClientConfig, BackoffPolicy, HttpBookkeepingClient};
use finboard_storage::PgStore;
use finboard_sync::{
    maybe_build_scheduler, LogNotificationHook, SyncConfig, SyncPipeline,
};
use finboard_web::AppState;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "finboard")]
#[command(about = "Finboard sync pipeline and dashboard backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the web surface (and the cron scheduler when enabled).
    Serve,
    /// Run one sync round for a tenant and print the result.
    Sync {
        #[arg(long)]
        tenant: Uuid,
        /// Skip bulk fetch; only resume enrichment of pending records.
        #[arg(long)]
        resume_only: bool,
    },
    /// Print the tenant's enrichment state and progress.
    Status {
        #[arg(long)]
        tenant: Uuid,
    },
    /// Apply database migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = SyncConfig::from_env();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Migrate => {
            PgStore::connect(&config.database_url)
                .await
                .context("connecting to database")?;
            println!("migrations applied");
        }
        Commands::Sync {
            tenant,
            resume_only,
        } => {
            let (pipeline, _store) = build_pipeline(config).await?;
            let result = pipeline.trigger(tenant, resume_only).await?;
            println!(
                "sync round finished: success={} completed={} processed={}/{} message={}",
                result.success,
                result.completed,
                result.progress.processed,
                result.progress.total,
                result.message
            );
        }
        Commands::Status { tenant } => {
            let (pipeline, _store) = build_pipeline(config).await?;
            let report = pipeline.sync_status(tenant).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Serve => {
            let (pipeline, store) = build_pipeline(config).await?;
            let tenants = scheduler_tenants_from_env();
            if let Some(mut scheduler) =
                maybe_build_scheduler(pipeline.clone(), tenants).await?
            {
                scheduler.start().await.context("starting scheduler")?;
            }
            let admin_token = std::env::var("FINBOARD_ADMIN_TOKEN").ok();
            finboard_web::serve_from_env(AppState::new(pipeline, store, admin_token)).await?;
        }
    }

    Ok(())
}

async fn build_pipeline(config: SyncConfig) -> Result<(Arc<SyncPipeline>, Arc<PgStore>)> {
    let store = Arc::new(
        PgStore::connect(&config.database_url)
            .await
            .context("connecting to database")?,
    );
    let api = Arc::new(
        HttpBookkeepingClient::new(ApiClientConfig {
            base_url: config.api_base_url.clone(),
            auth_url: config.auth_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            timeout: Duration::from_secs(config.http_timeout_secs),
            backoff: BackoffPolicy::default(),
        })
        .context("building bookkeeping client")?,
    );
    let pipeline = Arc::new(
        SyncPipeline::new(config, store.clone(), api)
            .with_notification(Arc::new(LogNotificationHook)),
    );
    Ok((pipeline, store))
}

fn scheduler_tenants_from_env() -> Vec<Uuid> {
    std::env::var("FINBOARD_SYNC_TENANTS")
        .map(|raw| {
            raw.split(',')
                .filter_map(|part| part.trim().parse().ok())
                .collect()
        })
        .unwrap_or_default()
}

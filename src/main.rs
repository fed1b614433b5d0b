//! WSR Worker - Backend service for weekly status report intake
//!
//! This worker connects to NATS, takes grid batches from the frontend through
//! the submission pipeline and serves the reporting dashboards.

mod cli;
mod config;
mod db;
mod defaults;
mod error;
mod handlers;
mod services;
mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::services::pipeline::{NoopProgress, SubmissionPipeline};
use crate::services::store::PgReportStore;
use crate::types::{FormKind, PipelineState, SubmissionResult, SubmitBatchRequest, TabularBatch};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs directory - use LOGS_DIR env var or default to ../logs (relative to worker)
    let logs_dir = std::env::var("LOGS_DIR")
        .unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(
        Rotation::DAILY,
        &logs_dir,
        "worker.log",
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,wsr_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())  // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))  // file
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            let pool = db::create_pool(&config.database_url).await?;
            db::run_migrations(&pool).await
        }
        Command::CheckColumns => {
            let mapping = config.column_mapping()?;
            info!("Column mapping from {} is valid", config.column_map_source());
            println!("{}", serde_json::to_string_pretty(&mapping)?);
            Ok(())
        }
        Command::Submit { kind, file, entered_by } => {
            let result = submit_file(&config, kind.into(), &file, entered_by).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if result.is_committed() || result.state == PipelineState::NothingToSubmit {
                Ok(())
            } else {
                anyhow::bail!(
                    "Submission failed: {}",
                    result.failure_reason.as_deref().unwrap_or("unknown reason")
                )
            }
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting WSR Worker...");

    // Connect to database
    let pool = db::create_pool(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    // Run migrations
    db::run_migrations(&pool).await?;

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match (&config.nats_user, &config.nats_password) {
        (Some(user), Some(password)) if !user.is_empty() => {
            async_nats::ConnectOptions::new()
                .user_and_password(user.clone(), password.clone())
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    // Start message handlers
    let handler_result = handlers::start_handlers(nats_client, pool, &config).await;

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Operator path: run a JSON batch file through the pipeline
async fn submit_file(
    config: &Config,
    form: FormKind,
    path: &Path,
    entered_by: Option<String>,
) -> Result<SubmissionResult> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file {}", path.display()))?;
    let rows: TabularBatch = serde_json::from_str(&raw)
        .with_context(|| format!("Batch file {} must hold a JSON array of rows", path.display()))?;
    info!(form = form.as_str(), rows = rows.len(), "Submitting batch from {}", path.display());

    let mapping = Arc::new(config.column_mapping()?);
    let pool = db::create_pool(&config.database_url).await?;
    let pipeline = SubmissionPipeline::new(
        Arc::new(PgReportStore::new(pool)),
        mapping,
        config.retry_policy(),
        Arc::new(config.snapshot_cache()),
    );

    Ok(pipeline
        .submit(form, SubmitBatchRequest { rows, entered_by }, &NoopProgress)
        .await)
}

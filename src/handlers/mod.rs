//! NATS message handlers

pub mod dashboard;
pub mod submission;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use sqlx::PgPool;
use tokio::select;
use tracing::{error, info};

use crate::config::Config;
use crate::services::dashboard::DashboardService;
use crate::services::pipeline::SubmissionPipeline;
use crate::services::store::{PgReportStore, ReportStore};
use crate::types::FormKind;

/// Start all message handlers
pub async fn start_handlers(client: Client, pool: PgPool, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let mapping = Arc::new(config.column_mapping()?);
    info!("Column mapping loaded from {}", config.column_map_source());

    let store: Arc<dyn ReportStore> = Arc::new(PgReportStore::new(pool));
    let pipeline = Arc::new(SubmissionPipeline::new(
        Arc::clone(&store),
        mapping,
        config.retry_policy(),
        Arc::new(config.snapshot_cache()),
    ));
    info!(
        max_attempts = config.submit_max_attempts,
        backoff = ?config.submit_backoff,
        "Submission pipeline initialized"
    );
    let dashboards = Arc::new(DashboardService::new(store));

    // Subscribe to all subjects
    let submit_weekly_sub = client.subscribe("wsr.submit.weekly").await?;
    let submit_accomplishments_sub = client.subscribe("wsr.submit.accomplishments").await?;
    let dashboard_management_sub = client.subscribe("wsr.dashboard.management").await?;
    let dashboard_hr_sub = client.subscribe("wsr.dashboard.hr").await?;
    let dashboard_accomplishments_sub = client.subscribe("wsr.dashboard.accomplishments").await?;

    info!("Subscribed to NATS subjects");

    let client_submit_weekly = client.clone();
    let pipeline_submit_weekly = Arc::clone(&pipeline);
    let submit_weekly_handle = tokio::spawn(async move {
        submission::handle_submit(client_submit_weekly, submit_weekly_sub, pipeline_submit_weekly, FormKind::WeeklyReport).await
    });

    let client_submit_accomplishments = client.clone();
    let pipeline_submit_accomplishments = Arc::clone(&pipeline);
    let submit_accomplishments_handle = tokio::spawn(async move {
        submission::handle_submit(
            client_submit_accomplishments,
            submit_accomplishments_sub,
            pipeline_submit_accomplishments,
            FormKind::Accomplishments,
        )
        .await
    });

    let client_management = client.clone();
    let dashboards_management = Arc::clone(&dashboards);
    let dashboard_management_handle = tokio::spawn(async move {
        dashboard::handle_management(client_management, dashboard_management_sub, dashboards_management).await
    });

    let client_hr = client.clone();
    let dashboards_hr = Arc::clone(&dashboards);
    let dashboard_hr_handle = tokio::spawn(async move {
        dashboard::handle_hr(client_hr, dashboard_hr_sub, dashboards_hr).await
    });

    let client_accomplishments = client.clone();
    let dashboards_accomplishments = Arc::clone(&dashboards);
    let dashboard_accomplishments_handle = tokio::spawn(async move {
        dashboard::handle_accomplishments(client_accomplishments, dashboard_accomplishments_sub, dashboards_accomplishments).await
    });

    info!("All handlers started, waiting for messages...");

    // Wait for any handler to finish (which would indicate an error)
    select! {
        result = submit_weekly_handle => {
            error!("Weekly submit handler finished: {:?}", result);
        }
        result = submit_accomplishments_handle => {
            error!("Accomplishments submit handler finished: {:?}", result);
        }
        result = dashboard_management_handle => {
            error!("Management dashboard handler finished: {:?}", result);
        }
        result = dashboard_hr_handle => {
            error!("HR dashboard handler finished: {:?}", result);
        }
        result = dashboard_accomplishments_handle => {
            error!("Accomplishments dashboard handler finished: {:?}", result);
        }
    }

    Ok(())
}

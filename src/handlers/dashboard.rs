//! Dashboard handlers for NATS messages

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::services::dashboard::DashboardService;
use crate::types::{AccomplishmentFilter, ErrorResponse, HrKpiRequest, ReportFilter, Request, SuccessResponse};

/// Handle wsr.dashboard.management messages
pub async fn handle_management(
    client: Client,
    mut subscriber: Subscriber,
    dashboards: Arc<DashboardService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received dashboard.management message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ReportFilter> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match dashboards.management(&request.payload).await {
            Ok(dashboard) => {
                let response = SuccessResponse::new(request.id, dashboard);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to build management dashboard: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle wsr.dashboard.hr messages
pub async fn handle_hr(
    client: Client,
    mut subscriber: Subscriber,
    dashboards: Arc<DashboardService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received dashboard.hr message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<HrKpiRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match dashboards.hr_kpis(&request.payload).await {
            Ok(kpis) => {
                let response = SuccessResponse::new(request.id, kpis);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to compute HR KPIs: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle wsr.dashboard.accomplishments messages
pub async fn handle_accomplishments(
    client: Client,
    mut subscriber: Subscriber,
    dashboards: Arc<DashboardService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received dashboard.accomplishments message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<AccomplishmentFilter> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match dashboards.accomplishments(&request.payload).await {
            Ok(summary) => {
                let response = SuccessResponse::new(request.id, summary);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to build accomplishments summary: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

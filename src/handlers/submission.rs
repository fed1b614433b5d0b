//! Submission handlers for NATS messages
//!
//! Each request runs in its own task so a submission sleeping in backoff
//! does not hold up the next one. Progress is published on
//! `wsr.submission.status.<request id>` while the pipeline runs; the reply
//! carries the terminal `SubmissionResult`.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::services::pipeline::{ProgressReporter, SubmissionPipeline};
use crate::types::{
    ErrorResponse, FormKind, Request, StatusUpdate, SubmissionResult, SubmissionStatus, SubmitBatchRequest,
    SuccessResponse,
};

pub const STATUS_SUBJECT_PREFIX: &str = "wsr.submission.status";

pub fn status_subject(request_id: Uuid) -> String {
    format!("{}.{}", STATUS_SUBJECT_PREFIX, request_id)
}

/// Forwards pipeline progress into a channel drained by a publishing task
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<SubmissionStatus>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SubmissionStatus>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressReporter for ChannelProgress {
    fn report(&self, status: SubmissionStatus) {
        // Receiver gone means nobody is publishing any more
        let _ = self.tx.send(status);
    }
}

/// Publish every status from `rx` until the sender side is dropped
async fn publish_progress(client: Client, request_id: Uuid, mut rx: mpsc::UnboundedReceiver<SubmissionStatus>) {
    let subject = status_subject(request_id);
    while let Some(status) = rx.recv().await {
        let update = StatusUpdate::new(request_id, status);
        let bytes = match serde_json::to_vec(&update) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to serialize status update: {}", e);
                continue;
            }
        };
        if let Err(e) = client.publish(subject.clone(), bytes.into()).await {
            warn!("Failed to publish status update for {}: {}", request_id, e);
        }
    }
}

/// Run one submission and publish its progress, returning the terminal result
async fn run_submission(
    client: &Client,
    pipeline: &SubmissionPipeline,
    form: FormKind,
    request: Request<SubmitBatchRequest>,
) -> SubmissionResult {
    let (progress, rx) = ChannelProgress::new();
    let publisher = tokio::spawn(publish_progress(client.clone(), request.id, rx));

    let result = pipeline.submit(form, request.payload, &progress).await;

    drop(progress);
    if let Err(e) = publisher.await {
        warn!("Status publisher for {} ended abnormally: {}", request.id, e);
    }
    result
}

/// Handle wsr.submit.weekly and wsr.submit.accomplishments messages
pub async fn handle_submit(
    client: Client,
    mut subscriber: Subscriber,
    pipeline: Arc<SubmissionPipeline>,
    form: FormKind,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!(form = form.as_str(), "Received submit message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<SubmitBatchRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse submit request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let client = client.clone();
        let pipeline = Arc::clone(&pipeline);

        // Process in separate task
        tokio::spawn(async move {
            let request_id = request.id;
            let result = run_submission(&client, &pipeline, form, request).await;
            info!(
                %request_id,
                form = form.as_str(),
                state = ?result.state,
                inserted = result.inserted_count,
                "Submission finished"
            );

            let response = SuccessResponse::new(request_id, result);
            match serde_json::to_vec(&response) {
                Ok(bytes) => {
                    if let Err(e) = client.publish(reply, bytes.into()).await {
                        error!("Failed to reply to submission {}: {}", request_id, e);
                    }
                }
                Err(e) => error!("Failed to serialize submission result: {}", e),
            }
        });
    }

    Ok(())
}

//! Metrics and pass history handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::reply_error;
use crate::services::pass_history::PassHistory;
use crate::services::store::DispatchStore;
use crate::services::summary::summarize;
use crate::types::{EmptyPayload, ErrorResponse, Request, SuccessResponse};

const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassHistoryRequest {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Handle dispatch.metrics messages
pub async fn handle_metrics(
    client: Client,
    mut subscriber: Subscriber,
    store: Arc<dyn DispatchStore>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received metrics message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<EmptyPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let loaded = match store.list_rides().await {
            Ok(rides) => store.list_drivers().await.map(|drivers| (rides, drivers)),
            Err(e) => Err(e),
        };

        match loaded {
            Ok((rides, drivers)) => {
                let response = SuccessResponse::new(request.id, summarize(&rides, &drivers));
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to build metrics: {}", e);
                reply_error(&client, reply, request.id, &e).await?;
            }
        }
    }

    Ok(())
}

/// Handle dispatch.pass.history messages
pub async fn handle_pass_history(
    client: Client,
    mut subscriber: Subscriber,
    history: Arc<PassHistory>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received pass.history message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<PassHistoryRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let limit = request.payload.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        let response = SuccessResponse::new(request.id, history.get_recent(limit));
        let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
    }

    Ok(())
}

//! Driver and rider listing handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::reply_error;
use crate::services::store::DispatchStore;
use crate::types::{Driver, EmptyPayload, ErrorResponse, ListResponse, Request, SuccessResponse};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDriversRequest {
    #[serde(default)]
    pub available_only: bool,
}

/// Handle dispatch.driver.list messages
pub async fn handle_list_drivers(
    client: Client,
    mut subscriber: Subscriber,
    store: Arc<dyn DispatchStore>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received driver.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ListDriversRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let drivers = if request.payload.available_only {
            store.list_available_drivers().await
        } else {
            store.list_drivers().await
        };

        match drivers {
            Ok(drivers) => {
                let response = SuccessResponse::new(request.id, ListResponse::<Driver>::new(drivers));
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to list drivers: {}", e);
                reply_error(&client, reply, request.id, &e).await?;
            }
        }
    }

    Ok(())
}

/// Handle dispatch.rider.list messages
pub async fn handle_list_riders(
    client: Client,
    mut subscriber: Subscriber,
    store: Arc<dyn DispatchStore>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received rider.list message");

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

        match store.list_riders().await {
            Ok(riders) => {
                let response = SuccessResponse::new(request.id, ListResponse::new(riders));
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to list riders: {}", e);
                reply_error(&client, reply, request.id, &e).await?;
            }
        }
    }

    Ok(())
}

//! Ride handlers for NATS messages

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use chrono::Utc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::reply_error;
use crate::services::lifecycle::{CompletionOutcome, RideLifecycle};
use crate::services::store::DispatchStore;
use crate::types::{
    AdvanceRideRequest, ErrorResponse, ListResponse, Request, RequestRideRequest, Ride, RideEvent,
    RideStatus, SuccessResponse,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRidesRequest {
    #[serde(default)]
    pub status: Option<RideStatus>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AdvanceResponse {
    Moved(Ride),
    Completed(CompletionOutcome),
}

/// Handle dispatch.ride.list messages
pub async fn handle_list(
    client: Client,
    mut subscriber: Subscriber,
    store: Arc<dyn DispatchStore>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received ride.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ListRidesRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match store.list_rides().await {
            Ok(rides) => {
                let rides: Vec<Ride> = match request.payload.status {
                    Some(status) => rides.into_iter().filter(|r| r.status == status).collect(),
                    None => rides,
                };
                let response = SuccessResponse::new(request.id, ListResponse::new(rides));
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to list rides: {}", e);
                reply_error(&client, reply, request.id, &e).await?;
            }
        }
    }

    Ok(())
}

/// Handle dispatch.ride.request messages
pub async fn handle_request(
    client: Client,
    mut subscriber: Subscriber,
    lifecycle: Arc<RideLifecycle>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received ride.request message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<RequestRideRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let payload = request.payload;
        match lifecycle
            .request_ride(payload.rider_id, payload.pickup, payload.dropoff, Utc::now())
            .await
        {
            Ok(ride) => {
                let response = SuccessResponse::new(request.id, ride);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                warn!("Ride request for rider {} rejected: {}", payload.rider_id, e);
                reply_error(&client, reply, request.id, &e).await?;
            }
        }
    }

    Ok(())
}

/// Handle dispatch.ride.advance messages
pub async fn handle_advance(
    client: Client,
    mut subscriber: Subscriber,
    lifecycle: Arc<RideLifecycle>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received ride.advance message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<AdvanceRideRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let AdvanceRideRequest { ride_id, event, at } = request.payload;
        let at = at.unwrap_or_else(Utc::now);
        let result = match event {
            RideEvent::Arrived => lifecycle.mark_driver_arrived(ride_id, at).await.map(AdvanceResponse::Moved),
            RideEvent::Start => lifecycle.start_ride(ride_id, at).await.map(AdvanceResponse::Moved),
            RideEvent::Complete => lifecycle.complete_ride(ride_id, at).await.map(AdvanceResponse::Completed),
        };

        match result {
            Ok(outcome) => {
                let response = SuccessResponse::new(request.id, outcome);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                warn!("Ride {} could not handle {:?}: {}", ride_id, event, e);
                reply_error(&client, reply, request.id, &e).await?;
            }
        }
    }

    Ok(())
}

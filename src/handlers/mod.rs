//! NATS message handlers

pub mod driver;
pub mod metrics;
pub mod ping;
pub mod ride;

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subject};
use tokio::select;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::services::lifecycle::RideLifecycle;
use crate::services::pass_history::PassHistory;
use crate::services::store::DispatchStore;
use crate::types::ErrorResponse;

/// Publish a core error as an error response, using the error's stable code
pub(crate) async fn reply_error(
    client: &Client,
    reply: Subject,
    request_id: Uuid,
    err: &DispatchError,
) -> Result<()> {
    let error = ErrorResponse::new(request_id, err.code(), err.to_string());
    let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
    Ok(())
}

/// Start all message handlers. Returns when any handler stops.
pub async fn start_handlers(
    client: Client,
    store: Arc<dyn DispatchStore>,
    lifecycle: Arc<RideLifecycle>,
    history: Arc<PassHistory>,
) -> Result<()> {
    info!("Starting message handlers...");

    let ping_sub = client.subscribe("dispatch.ping").await?;
    let ride_list_sub = client.subscribe("dispatch.ride.list").await?;
    let ride_request_sub = client.subscribe("dispatch.ride.request").await?;
    let ride_advance_sub = client.subscribe("dispatch.ride.advance").await?;
    let driver_list_sub = client.subscribe("dispatch.driver.list").await?;
    let rider_list_sub = client.subscribe("dispatch.rider.list").await?;
    let metrics_sub = client.subscribe("dispatch.metrics").await?;
    let pass_history_sub = client.subscribe("dispatch.pass.history").await?;

    info!("Subscribed to NATS subjects");

    let client_ping = client.clone();
    let store_name = store.name().to_string();
    let ping_handle = tokio::spawn(async move {
        ping::handle_ping(client_ping, ping_sub, store_name).await
    });

    let client_ride_list = client.clone();
    let store_ride_list = Arc::clone(&store);
    let ride_list_handle = tokio::spawn(async move {
        ride::handle_list(client_ride_list, ride_list_sub, store_ride_list).await
    });

    let client_ride_request = client.clone();
    let lifecycle_request = Arc::clone(&lifecycle);
    let ride_request_handle = tokio::spawn(async move {
        ride::handle_request(client_ride_request, ride_request_sub, lifecycle_request).await
    });

    let client_ride_advance = client.clone();
    let lifecycle_advance = Arc::clone(&lifecycle);
    let ride_advance_handle = tokio::spawn(async move {
        ride::handle_advance(client_ride_advance, ride_advance_sub, lifecycle_advance).await
    });

    let client_driver_list = client.clone();
    let store_driver_list = Arc::clone(&store);
    let driver_list_handle = tokio::spawn(async move {
        driver::handle_list_drivers(client_driver_list, driver_list_sub, store_driver_list).await
    });

    let client_rider_list = client.clone();
    let store_rider_list = Arc::clone(&store);
    let rider_list_handle = tokio::spawn(async move {
        driver::handle_list_riders(client_rider_list, rider_list_sub, store_rider_list).await
    });

    let client_metrics = client.clone();
    let store_metrics = Arc::clone(&store);
    let metrics_handle = tokio::spawn(async move {
        metrics::handle_metrics(client_metrics, metrics_sub, store_metrics).await
    });

    let client_history = client.clone();
    let pass_history_handle = tokio::spawn(async move {
        metrics::handle_pass_history(client_history, pass_history_sub, history).await
    });

    info!("All handlers started");

    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = ride_list_handle => {
            error!("Ride list handler finished: {:?}", result);
        }
        result = ride_request_handle => {
            error!("Ride request handler finished: {:?}", result);
        }
        result = ride_advance_handle => {
            error!("Ride advance handler finished: {:?}", result);
        }
        result = driver_list_handle => {
            error!("Driver list handler finished: {:?}", result);
        }
        result = rider_list_handle => {
            error!("Rider list handler finished: {:?}", result);
        }
        result = metrics_handle => {
            error!("Metrics handler finished: {:?}", result);
        }
        result = pass_history_handle => {
            error!("Pass history handler finished: {:?}", result);
        }
    }

    Ok(())
}

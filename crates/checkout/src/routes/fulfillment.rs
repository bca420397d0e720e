//! Fulfillment request administration.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use pawprint_core::FulfillmentRequestId;
use serde::Serialize;

use crate::error::Result;
use crate::middleware::StoreContext;
use crate::models::FulfillmentRequest;
use crate::resilience::BreakerSnapshot;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/requests", get(list_requests))
        .route("/requests/{request_id}", get(get_request))
        .route("/requests/{request_id}/retry", post(retry_request))
        .route("/requests/{request_id}/cancel", post(cancel_request))
        .route("/breakers", get(breaker_snapshots))
}

#[derive(Debug, Serialize)]
struct ActionResponse {
    success: bool,
}

async fn list_requests(
    State(state): State<AppState>,
    StoreContext(store_id): StoreContext,
) -> Result<Json<Vec<FulfillmentRequest>>> {
    let requests = state.dispatcher().list(store_id).await?;
    Ok(Json(requests))
}

async fn get_request(
    State(state): State<AppState>,
    StoreContext(store_id): StoreContext,
    Path(request_id): Path<FulfillmentRequestId>,
) -> Result<Json<FulfillmentRequest>> {
    let request = state.dispatcher().get(store_id, request_id).await?;
    Ok(Json(request))
}

/// Retry a failed or cancelled request.
///
/// Performs the state transition and enqueues background submission; the
/// response does not wait for the provider call. 404 for an unknown id, 400
/// when the current status does not allow a retry.
async fn retry_request(
    State(state): State<AppState>,
    StoreContext(store_id): StoreContext,
    Path(request_id): Path<FulfillmentRequestId>,
) -> Result<Json<ActionResponse>> {
    state.dispatcher().retry(store_id, request_id).await?;
    Ok(Json(ActionResponse { success: true }))
}

/// Administratively cancel a request. Does not abort an in-flight provider
/// call.
async fn cancel_request(
    State(state): State<AppState>,
    StoreContext(store_id): StoreContext,
    Path(request_id): Path<FulfillmentRequestId>,
) -> Result<Json<ActionResponse>> {
    state.dispatcher().cancel(store_id, request_id).await?;
    Ok(Json(ActionResponse { success: true }))
}

/// Current circuit breaker state per provider, for the admin dashboard.
async fn breaker_snapshots(State(state): State<AppState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.registry().breakers().snapshots())
}

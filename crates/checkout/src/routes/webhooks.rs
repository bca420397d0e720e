//! Inbound provider webhooks.
//!
//! Signature verification runs over the raw body through the provider
//! adapter. Providers without a signing scheme are accepted by the adapter
//! unconditionally; the external-order-id lookup below is the compensating
//! control - events that do not match an existing request row for the
//! addressed store are ignored.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use pawprint_core::{FulfillmentStatus, ProviderType, StoreId};
use serde::Serialize;
use tracing::warn;

use crate::error::{AppError, Result};
use crate::fulfillment::ProviderResolver;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/fulfillment/{store_id}/{provider}", post(receive))
}

/// Signature header per provider. Providers without signing still often echo
/// a header; an absent header is passed through as an empty signature.
const fn signature_header(provider: ProviderType) -> &'static str {
    match provider {
        ProviderType::Printful => "x-printful-signature",
        ProviderType::Prodigi => "x-prodigi-signature",
        ProviderType::Gooten | ProviderType::Shapeways => "x-webhook-signature",
    }
}

#[derive(Debug, Serialize)]
struct WebhookResponse {
    received: bool,
}

async fn receive(
    State(state): State<AppState>,
    Path((store_id, provider)): Path<(StoreId, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>> {
    let provider: ProviderType = provider
        .parse()
        .map_err(|_| AppError::NotFound(format!("unknown provider '{provider}'")))?;

    let adapter = state.registry().resolve(store_id, provider).await?;

    let signature = headers
        .get(signature_header(provider))
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if !adapter.verify_webhook(&body, signature) {
        return Err(AppError::Unauthorized(format!(
            "invalid {provider} webhook signature"
        )));
    }

    let event: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("malformed webhook body: {e}")))?;

    let Some((external_id, status)) = parse_event(provider, &event) else {
        // Unrecognized event types are acknowledged and dropped.
        warn!(provider = %provider, "unhandled webhook event shape");
        return Ok(Json(WebhookResponse { received: false }));
    };

    let applied = state
        .dispatcher()
        .record_provider_event(store_id, provider, &external_id, status)
        .await?;

    Ok(Json(WebhookResponse {
        received: applied.is_some(),
    }))
}

/// Extract `(external order id, new status)` from a provider event payload.
///
/// Only a small set of lifecycle events moves the internal status machine;
/// everything else is ignored. Provider status strings stay opaque - this
/// mapping keys off event names/stages, not free-form status display text.
fn parse_event(provider: ProviderType, event: &serde_json::Value) -> Option<(String, FulfillmentStatus)> {
    match provider {
        ProviderType::Printful => {
            let external_id = event
                .pointer("/data/order/id")
                .and_then(serde_json::Value::as_i64)?
                .to_string();
            let status = match event.get("type").and_then(serde_json::Value::as_str)? {
                "package_shipped" => FulfillmentStatus::Shipped,
                "order_canceled" => FulfillmentStatus::Cancelled,
                "order_failed" => FulfillmentStatus::Failed,
                _ => return None,
            };
            Some((external_id, status))
        }
        ProviderType::Gooten => {
            let external_id = event.get("Id").and_then(serde_json::Value::as_str)?.to_string();
            let status = match event.get("Status").and_then(serde_json::Value::as_str)? {
                "Shipped" => FulfillmentStatus::Shipped,
                "Delivered" => FulfillmentStatus::Delivered,
                "Cancelled" => FulfillmentStatus::Cancelled,
                _ => return None,
            };
            Some((external_id, status))
        }
        ProviderType::Prodigi => {
            let external_id = event
                .pointer("/order/id")
                .and_then(serde_json::Value::as_str)?
                .to_string();
            let status = match event
                .pointer("/order/status/stage")
                .and_then(serde_json::Value::as_str)?
            {
                "Complete" => FulfillmentStatus::Delivered,
                "Cancelled" => FulfillmentStatus::Cancelled,
                _ => return None,
            };
            Some((external_id, status))
        }
        ProviderType::Shapeways => {
            let external_id = event
                .get("orderId")
                .and_then(serde_json::Value::as_i64)?
                .to_string();
            let status = match event.get("status").and_then(serde_json::Value::as_str)? {
                "shipped" => FulfillmentStatus::Shipped,
                "delivered" => FulfillmentStatus::Delivered,
                "cancelled" => FulfillmentStatus::Cancelled,
                _ => return None,
            };
            Some((external_id, status))
        }
    }
}

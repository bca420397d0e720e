//! Fulfillment requests, provider credentials, and the provider-agnostic
//! order contract shared by every adapter.

use chrono::{DateTime, Utc};
use pawprint_core::{
    FulfillmentRequestId, FulfillmentStatus, OrderId, ProviderConfigId, ProviderType, StoreId,
};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Ship-to details for a provider order.
///
/// Providers disagree on shapes (split names, `line1`/`line2` vs
/// `address1`/`address2`); adapters map from this single representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Full name. Adapters that need first/last split on the first space.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub address1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
    pub country_code: String,
    pub zip: String,
}

impl Recipient {
    /// Split the full name into (first, last) the way providers with split
    /// name fields expect: everything after the first space is the last name.
    #[must_use]
    pub fn split_name(&self) -> (&str, &str) {
        match self.name.split_once(' ') {
            Some((first, last)) => (first, last),
            None => (self.name.as_str(), ""),
        }
    }
}

/// One line of a provider order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Provider-facing item reference (catalog SKU or variant id).
    pub sku: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retail_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Provider-specific extras (e.g. Gooten ship method, Shapeways
    /// material id). Opaque to the dispatcher.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub attributes: serde_json::Value,
}

/// The payload persisted on a fulfillment request and replayed on retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub recipient: Recipient,
    pub items: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_method: Option<String>,
}

/// Fully-assembled order handed to an adapter's `create_order`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProviderOrder {
    /// Platform order id; forwarded as the provider-side idempotency key
    /// where the provider supports one.
    pub order_id: OrderId,
    pub recipient: Recipient,
    pub items: Vec<OrderItem>,
    pub shipping_method: Option<String>,
}

/// A provider's view of an order.
///
/// `status` is an opaque provider-specific string for display only; the
/// persisted [`FulfillmentStatus`] is the authoritative state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderOrder {
    pub external_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_url: Option<String>,
}

/// A shipping option quoted by a provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShippingRate {
    pub id: String,
    pub name: String,
    pub rate: Decimal,
    pub currency: String,
}

/// One product from a provider catalog page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogProduct {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// Stored credentials and knobs for one provider on one store.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct FulfillmentProviderConfig {
    pub id: ProviderConfigId,
    pub store_id: StoreId,
    pub provider: ProviderType,
    pub api_key: SecretString,
    /// Doubles as the webhook signing secret for providers that publish one.
    pub api_secret: Option<SecretString>,
    /// Provider-specific knobs (`api_base` override, Printful
    /// `auto_confirm`, ...).
    pub config: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for FulfillmentProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FulfillmentProviderConfig")
            .field("id", &self.id)
            .field("store_id", &self.store_id)
            .field("provider", &self.provider)
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &self.api_secret.as_ref().map(|_| "[REDACTED]"))
            .field("config", &self.config)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

/// Durable record of one order's dispatch attempt to a provider.
///
/// Created when an order requires physical fulfillment, mutated only through
/// the dispatcher, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FulfillmentRequest {
    pub id: FulfillmentRequestId,
    pub store_id: StoreId,
    pub order_id: OrderId,
    pub provider: ProviderType,
    pub status: FulfillmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip)]
    pub payload: SubmissionPayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a fulfillment request.
#[derive(Debug, Clone)]
pub struct NewFulfillmentRequest {
    pub store_id: StoreId,
    pub order_id: OrderId,
    pub provider: ProviderType,
    pub payload: SubmissionPayload,
}

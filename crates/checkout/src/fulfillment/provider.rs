//! The uniform provider contract and shared adapter plumbing.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use pawprint_core::ProviderType;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use sha2::Sha256;

use crate::models::{CatalogProduct, NewProviderOrder, OrderItem, ProviderOrder, Recipient, ShippingRate};
use crate::resilience::BreakerError;

use super::ProviderApiError;

/// Common contract implemented by every fulfillment provider adapter.
///
/// Implementations route every network call through their dedicated circuit
/// breaker and a bounded-timeout HTTP client. `ProviderOrder::status` is an
/// opaque provider-specific string for display only; callers must never
/// branch on it.
#[async_trait]
pub trait FulfillmentProvider: Send + Sync {
    /// Which provider this adapter talks to.
    fn provider_type(&self) -> ProviderType;

    /// Submit an order. The platform order id travels as the provider-side
    /// idempotency/correlation key where the provider supports one.
    async fn create_order(&self, order: &NewProviderOrder) -> Result<ProviderOrder, ProviderApiError>;

    /// Fetch the provider's current view of an order.
    async fn get_order(&self, external_order_id: &str) -> Result<ProviderOrder, ProviderApiError>;

    /// Cancel an order on the provider side.
    async fn cancel_order(&self, external_order_id: &str) -> Result<(), ProviderApiError>;

    /// Quote shipping options for a prospective order.
    async fn shipping_rates(
        &self,
        recipient: &Recipient,
        items: &[OrderItem],
    ) -> Result<Vec<ShippingRate>, ProviderApiError>;

    /// One page of the provider's product catalog.
    async fn catalog(&self, page: Option<u32>) -> Result<Vec<CatalogProduct>, ProviderApiError>;

    /// Verify a webhook signature over the raw request body.
    ///
    /// Providers without a documented signing scheme (Gooten, Shapeways)
    /// return `true` unconditionally; the webhook route compensates with an
    /// order-id cross-check. See DESIGN.md.
    fn verify_webhook(&self, payload: &[u8], signature: &str) -> bool;
}

/// Collapse a breaker-wrapped provider error into [`ProviderApiError`].
pub(super) fn flatten_breaker(
    provider: ProviderType,
    error: BreakerError<ProviderApiError>,
) -> ProviderApiError {
    match error {
        BreakerError::Open { retry_after, .. } => ProviderApiError::CircuitOpen {
            provider,
            retry_after,
        },
        BreakerError::Timeout { timeout, .. } => ProviderApiError::Timeout { provider, timeout },
        BreakerError::Inner(inner) => inner,
    }
}

/// Check the HTTP status and deserialize the body into the adapter's typed
/// response schema. An unexpected shape is a typed error, never
/// silently-defaulted fields.
pub(super) async fn parse_json<T: DeserializeOwned>(
    provider: ProviderType,
    response: reqwest::Response,
) -> Result<T, ProviderApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderApiError::Api {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderApiError::UnexpectedResponse {
        provider,
        detail: e.to_string(),
    })
}

/// Optional `api_base` override from a provider config blob.
///
/// Must parse as an absolute URL; trailing slashes are trimmed so adapters
/// can join paths with plain `format!`.
pub(super) fn base_url_override(config: &serde_json::Value) -> Option<String> {
    let raw = config.get("api_base")?.as_str()?;
    let parsed = url::Url::parse(raw).ok()?;
    Some(parsed.as_str().trim_end_matches('/').to_string())
}

/// HMAC-SHA256 webhook verification: hex-encode the digest over the raw
/// payload and compare against the provider-supplied signature in constant
/// time.
pub(super) fn verify_hmac_sha256_hex(
    secret: &SecretString,
    payload: &[u8],
    signature: &str,
) -> bool {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes()) else {
        return false;
    };
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    constant_time_compare(&expected, signature)
}

/// Constant-time string comparison to prevent timing attacks.
///
/// Rejects on length mismatch, otherwise XOR-accumulates per byte and
/// requires zero accumulated difference.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

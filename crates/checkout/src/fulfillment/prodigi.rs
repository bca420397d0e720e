//! Prodigi adapter.
//!
//! Auth via the `X-API-Key` header. Recipient addresses use
//! `line1`/`line2`/`postalOrZipCode`; the platform order id travels as
//! `merchantReference`, which Prodigi echoes back and treats as a duplicate
//! guard. Webhooks are HMAC-SHA256 signed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pawprint_core::ProviderType;
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::models::{
    CatalogProduct, FulfillmentProviderConfig, NewProviderOrder, OrderItem, ProviderOrder,
    Recipient, ShippingRate,
};
use crate::resilience::CircuitBreaker;

use super::provider::{base_url_override, flatten_breaker, parse_json, verify_hmac_sha256_hex};
use super::{FulfillmentProvider, ProviderApiError};

const BASE_URL: &str = "https://api.prodigi.com/v4.0";

#[derive(Debug, Deserialize)]
struct ProdigiOrderResponse {
    order: ProdigiOrder,
}

#[derive(Debug, Deserialize)]
struct ProdigiOrder {
    id: String,
    status: ProdigiOrderStatus,
    #[serde(default)]
    shipments: Vec<ProdigiShipment>,
}

#[derive(Debug, Deserialize)]
struct ProdigiOrderStatus {
    stage: String,
}

#[derive(Debug, Deserialize)]
struct ProdigiShipment {
    #[serde(default)]
    tracking: Option<ProdigiTracking>,
}

#[derive(Debug, Deserialize)]
struct ProdigiTracking {
    number: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProdigiQuoteResponse {
    #[serde(default)]
    quotes: Vec<ProdigiQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProdigiQuote {
    shipment_method: String,
    cost_summary: ProdigiCostSummary,
}

#[derive(Debug, Deserialize)]
struct ProdigiCostSummary {
    shipping: ProdigiCost,
}

#[derive(Debug, Deserialize)]
struct ProdigiCost {
    amount: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct ProdigiProductList {
    #[serde(default)]
    products: Vec<ProdigiProduct>,
}

#[derive(Debug, Deserialize)]
struct ProdigiProduct {
    sku: String,
    #[serde(default)]
    description: Option<String>,
}

/// Prodigi API adapter.
pub struct ProdigiProvider {
    client: reqwest::Client,
    base_url: String,
    breaker: Arc<CircuitBreaker>,
    webhook_secret: Option<SecretString>,
}

impl ProdigiProvider {
    /// Build an adapter from a store's provider config.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key cannot form a valid header or the
    /// HTTP client fails to build.
    pub fn new(
        config: &FulfillmentProviderConfig,
        breaker: Arc<CircuitBreaker>,
        timeout: Duration,
    ) -> Result<Self, ProviderApiError> {
        let mut headers = HeaderMap::new();
        let mut key_value = HeaderValue::from_str(config.api_key.expose_secret()).map_err(|e| {
            ProviderApiError::InvalidRequest {
                provider: ProviderType::Prodigi,
                detail: format!("invalid API key: {e}"),
            }
        })?;
        key_value.set_sensitive(true);
        headers.insert("X-API-Key", key_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url_override(&config.config).unwrap_or_else(|| BASE_URL.to_string()),
            breaker,
            webhook_secret: config.api_secret.clone(),
        })
    }

    fn convert_order(order: ProdigiOrder) -> ProviderOrder {
        let tracking = order
            .shipments
            .into_iter()
            .find_map(|shipment| shipment.tracking);
        ProviderOrder {
            external_id: order.id,
            status: order.status.stage,
            tracking_number: tracking.as_ref().and_then(|t| t.number.clone()),
            tracking_url: tracking.and_then(|t| t.url),
        }
    }
}

/// Build the order creation payload with Prodigi's exact wire field names.
fn order_payload(order: &NewProviderOrder) -> serde_json::Value {
    json!({
        "merchantReference": order.order_id.to_string(),
        "shippingMethod": order.shipping_method.as_deref().unwrap_or("Standard"),
        "recipient": recipient_payload(&order.recipient),
        "items": order.items.iter().map(item_payload).collect::<Vec<_>>(),
    })
}

fn recipient_payload(recipient: &Recipient) -> serde_json::Value {
    json!({
        "name": recipient.name,
        "email": recipient.email,
        "phoneNumber": recipient.phone,
        "address": {
            "line1": recipient.address1,
            "line2": recipient.address2,
            "postalOrZipCode": recipient.zip,
            "countryCode": recipient.country_code,
            "townOrCity": recipient.city,
            "stateOrCounty": recipient.state_code,
        },
    })
}

fn item_payload(item: &OrderItem) -> serde_json::Value {
    let assets = item
        .attributes
        .get("asset_url")
        .and_then(serde_json::Value::as_str)
        .map(|url| json!([{"printArea": "default", "url": url}]))
        .unwrap_or_else(|| json!([]));

    json!({
        "merchantReference": item.name,
        "sku": item.sku,
        "copies": item.quantity,
        "sizing": "fillPrintArea",
        "assets": assets,
    })
}

#[async_trait]
impl FulfillmentProvider for ProdigiProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Prodigi
    }

    async fn create_order(&self, order: &NewProviderOrder) -> Result<ProviderOrder, ProviderApiError> {
        let payload = order_payload(order);
        let url = format!("{}/Orders", self.base_url);

        let response: ProdigiOrderResponse = self
            .breaker
            .execute(|| async {
                let response = self.client.post(&url).json(&payload).send().await?;
                parse_json(ProviderType::Prodigi, response).await
            })
            .await
            .map_err(|e| flatten_breaker(ProviderType::Prodigi, e))?;

        Ok(Self::convert_order(response.order))
    }

    async fn get_order(&self, external_order_id: &str) -> Result<ProviderOrder, ProviderApiError> {
        let url = format!("{}/Orders/{external_order_id}", self.base_url);

        let response: ProdigiOrderResponse = self
            .breaker
            .execute(|| async {
                let response = self.client.get(&url).send().await?;
                parse_json(ProviderType::Prodigi, response).await
            })
            .await
            .map_err(|e| flatten_breaker(ProviderType::Prodigi, e))?;

        Ok(Self::convert_order(response.order))
    }

    async fn cancel_order(&self, external_order_id: &str) -> Result<(), ProviderApiError> {
        let url = format!("{}/Orders/{external_order_id}/actions/cancel", self.base_url);

        let _: serde_json::Value = self
            .breaker
            .execute(|| async {
                let response = self.client.post(&url).send().await?;
                parse_json(ProviderType::Prodigi, response).await
            })
            .await
            .map_err(|e| flatten_breaker(ProviderType::Prodigi, e))?;

        Ok(())
    }

    async fn shipping_rates(
        &self,
        recipient: &Recipient,
        items: &[OrderItem],
    ) -> Result<Vec<ShippingRate>, ProviderApiError> {
        let quote_items: Vec<_> = items
            .iter()
            .map(|item| json!({"sku": item.sku, "copies": item.quantity}))
            .collect();
        let payload = json!({
            "shippingMethod": "Standard",
            "destinationCountryCode": recipient.country_code,
            "items": quote_items,
        });
        let url = format!("{}/Quotes", self.base_url);

        let response: ProdigiQuoteResponse = self
            .breaker
            .execute(|| async {
                let response = self.client.post(&url).json(&payload).send().await?;
                parse_json(ProviderType::Prodigi, response).await
            })
            .await
            .map_err(|e| flatten_breaker(ProviderType::Prodigi, e))?;

        response
            .quotes
            .into_iter()
            .map(|quote| {
                let amount: Decimal = quote.cost_summary.shipping.amount.parse().map_err(|_| {
                    ProviderApiError::UnexpectedResponse {
                        provider: ProviderType::Prodigi,
                        detail: format!(
                            "non-decimal shipping amount '{}'",
                            quote.cost_summary.shipping.amount
                        ),
                    }
                })?;
                Ok(ShippingRate {
                    id: quote.shipment_method.clone(),
                    name: quote.shipment_method,
                    rate: amount,
                    currency: quote.cost_summary.shipping.currency,
                })
            })
            .collect()
    }

    async fn catalog(&self, page: Option<u32>) -> Result<Vec<CatalogProduct>, ProviderApiError> {
        let page = page.unwrap_or(0);
        let url = format!("{}/products?page={page}", self.base_url);

        let response: ProdigiProductList = self
            .breaker
            .execute(|| async {
                let response = self.client.get(&url).send().await?;
                parse_json(ProviderType::Prodigi, response).await
            })
            .await
            .map_err(|e| flatten_breaker(ProviderType::Prodigi, e))?;

        Ok(response
            .products
            .into_iter()
            .map(|product| CatalogProduct {
                name: product.description.unwrap_or_else(|| product.sku.clone()),
                id: product.sku,
                thumbnail_url: None,
            })
            .collect())
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> bool {
        self.webhook_secret
            .as_ref()
            .is_some_and(|secret| verify_hmac_sha256_hex(secret, payload, signature))
    }
}

//! Shapeways adapter.
//!
//! Bearer auth. The recipient name is split into `firstName`/`lastName` and
//! items reference an uploaded model plus a material. Shapeways documents no
//! webhook signing; see `verify_webhook`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pawprint_core::ProviderType;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;

use crate::models::{
    CatalogProduct, FulfillmentProviderConfig, NewProviderOrder, OrderItem, ProviderOrder,
    Recipient, ShippingRate,
};
use crate::resilience::CircuitBreaker;

use super::provider::{base_url_override, flatten_breaker, parse_json};
use super::{FulfillmentProvider, ProviderApiError};

const BASE_URL: &str = "https://api.shapeways.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShapewaysOrder {
    order_id: i64,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    tracking_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShapewaysShippingResponse {
    #[serde(default)]
    shipping_options: Vec<ShapewaysShippingOption>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShapewaysShippingOption {
    code: String,
    title: String,
    fee: Decimal,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShapewaysModelList {
    #[serde(default)]
    models: Vec<ShapewaysModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShapewaysModel {
    model_id: i64,
    title: String,
    #[serde(default)]
    url_thumbnail: Option<String>,
}

/// Shapeways API adapter.
pub struct ShapewaysProvider {
    client: reqwest::Client,
    base_url: String,
    breaker: Arc<CircuitBreaker>,
}

impl ShapewaysProvider {
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
        let auth = format!("Bearer {}", config.api_key.expose_secret());
        let mut auth_value =
            HeaderValue::from_str(&auth).map_err(|e| ProviderApiError::InvalidRequest {
                provider: ProviderType::Shapeways,
                detail: format!("invalid API key: {e}"),
            })?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url_override(&config.config).unwrap_or_else(|| BASE_URL.to_string()),
            breaker,
        })
    }

    fn convert_order(order: ShapewaysOrder) -> ProviderOrder {
        ProviderOrder {
            external_id: order.order_id.to_string(),
            status: order.status.unwrap_or_else(|| "received".to_string()),
            tracking_number: order.tracking_number,
            tracking_url: None,
        }
    }
}

/// Build the order creation payload with Shapeways' exact wire field names.
fn order_payload(order: &NewProviderOrder) -> Result<serde_json::Value, ProviderApiError> {
    let (first_name, last_name) = order.recipient.split_name();
    let items = order
        .items
        .iter()
        .map(item_payload)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({
        "items": items,
        "firstName": first_name,
        "lastName": last_name,
        "address1": order.recipient.address1,
        "address2": order.recipient.address2,
        "city": order.recipient.city,
        "state": order.recipient.state_code,
        "country": order.recipient.country_code,
        "zipCode": order.recipient.zip,
        "phoneNumber": order.recipient.phone,
        "shippingOption": order.shipping_method.as_deref().unwrap_or("Cheapest"),
    }))
}

fn item_payload(item: &OrderItem) -> Result<serde_json::Value, ProviderApiError> {
    let model_id: i64 = item
        .sku
        .parse()
        .map_err(|_| ProviderApiError::InvalidRequest {
            provider: ProviderType::Shapeways,
            detail: format!("item sku '{}' is not a Shapeways model id", item.sku),
        })?;
    let material_id = item
        .attributes
        .get("material_id")
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| ProviderApiError::InvalidRequest {
            provider: ProviderType::Shapeways,
            detail: format!("item '{}' is missing a material_id attribute", item.sku),
        })?;

    Ok(json!({
        "modelId": model_id,
        "materialId": material_id,
        "quantity": item.quantity,
    }))
}

#[async_trait]
impl FulfillmentProvider for ShapewaysProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Shapeways
    }

    async fn create_order(&self, order: &NewProviderOrder) -> Result<ProviderOrder, ProviderApiError> {
        let payload = order_payload(order)?;
        let url = format!("{}/orders/v1", self.base_url);

        let response: ShapewaysOrder = self
            .breaker
            .execute(|| async {
                let response = self.client.post(&url).json(&payload).send().await?;
                parse_json(ProviderType::Shapeways, response).await
            })
            .await
            .map_err(|e| flatten_breaker(ProviderType::Shapeways, e))?;

        Ok(Self::convert_order(response))
    }

    async fn get_order(&self, external_order_id: &str) -> Result<ProviderOrder, ProviderApiError> {
        let url = format!("{}/orders/{external_order_id}/v1", self.base_url);

        let response: ShapewaysOrder = self
            .breaker
            .execute(|| async {
                let response = self.client.get(&url).send().await?;
                parse_json(ProviderType::Shapeways, response).await
            })
            .await
            .map_err(|e| flatten_breaker(ProviderType::Shapeways, e))?;

        Ok(Self::convert_order(response))
    }

    async fn cancel_order(&self, external_order_id: &str) -> Result<(), ProviderApiError> {
        let url = format!("{}/orders/{external_order_id}/v1", self.base_url);
        let payload = json!({"status": "cancelled"});

        let _: serde_json::Value = self
            .breaker
            .execute(|| async {
                let response = self.client.put(&url).json(&payload).send().await?;
                parse_json(ProviderType::Shapeways, response).await
            })
            .await
            .map_err(|e| flatten_breaker(ProviderType::Shapeways, e))?;

        Ok(())
    }

    async fn shipping_rates(
        &self,
        recipient: &Recipient,
        items: &[OrderItem],
    ) -> Result<Vec<ShippingRate>, ProviderApiError> {
        let rate_items = items
            .iter()
            .map(item_payload)
            .collect::<Result<Vec<_>, _>>()?;
        let payload = json!({
            "items": rate_items,
            "country": recipient.country_code,
            "zipCode": recipient.zip,
        });
        let url = format!("{}/orders/shipping/v1", self.base_url);

        let response: ShapewaysShippingResponse = self
            .breaker
            .execute(|| async {
                let response = self.client.post(&url).json(&payload).send().await?;
                parse_json(ProviderType::Shapeways, response).await
            })
            .await
            .map_err(|e| flatten_breaker(ProviderType::Shapeways, e))?;

        Ok(response
            .shipping_options
            .into_iter()
            .map(|option| ShippingRate {
                id: option.code,
                name: option.title,
                rate: option.fee,
                currency: option.currency.unwrap_or_else(|| "USD".to_string()),
            })
            .collect())
    }

    async fn catalog(&self, page: Option<u32>) -> Result<Vec<CatalogProduct>, ProviderApiError> {
        let page = page.unwrap_or(1).max(1);
        let url = format!("{}/models/v1?page={page}", self.base_url);

        let response: ShapewaysModelList = self
            .breaker
            .execute(|| async {
                let response = self.client.get(&url).send().await?;
                parse_json(ProviderType::Shapeways, response).await
            })
            .await
            .map_err(|e| flatten_breaker(ProviderType::Shapeways, e))?;

        Ok(response
            .models
            .into_iter()
            .map(|model| CatalogProduct {
                id: model.model_id.to_string(),
                name: model.title,
                thumbnail_url: model.url_thumbnail,
            })
            .collect())
    }

    /// Shapeways documents no webhook signing scheme. Accepting
    /// unconditionally is a known forgery gap kept deliberately; the webhook
    /// route cross-checks the order id against an existing request row.
    fn verify_webhook(&self, _payload: &[u8], _signature: &str) -> bool {
        true
    }
}

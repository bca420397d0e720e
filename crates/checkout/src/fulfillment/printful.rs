//! Printful adapter.
//!
//! Bearer auth. Items reference `sync_variant_id`; the platform order id is
//! sent as `external_id`, which Printful treats as an idempotency key. Orders
//! are created as drafts unless the store config sets `auto_confirm`, in
//! which case `?confirm=true` submits them for fulfillment immediately.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pawprint_core::ProviderType;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
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

const BASE_URL: &str = "https://api.printful.com";

/// Envelope Printful wraps every response in.
#[derive(Debug, Deserialize)]
struct PrintfulResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct PrintfulOrder {
    id: i64,
    status: String,
    #[serde(default)]
    shipments: Vec<PrintfulShipment>,
}

#[derive(Debug, Deserialize)]
struct PrintfulShipment {
    tracking_number: Option<String>,
    tracking_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PrintfulShippingRate {
    id: String,
    name: String,
    rate: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct PrintfulCatalogProduct {
    id: i64,
    title: String,
    image: Option<String>,
}

/// Printful API adapter.
pub struct PrintfulProvider {
    client: reqwest::Client,
    base_url: String,
    breaker: Arc<CircuitBreaker>,
    webhook_secret: Option<SecretString>,
    auto_confirm: bool,
}

impl PrintfulProvider {
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
                provider: ProviderType::Printful,
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
            webhook_secret: config.api_secret.clone(),
            auto_confirm: config
                .config
                .get("auto_confirm")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false),
        })
    }

    fn convert_order(order: PrintfulOrder) -> ProviderOrder {
        let shipment = order.shipments.into_iter().next();
        ProviderOrder {
            external_id: order.id.to_string(),
            status: order.status,
            tracking_number: shipment.as_ref().and_then(|s| s.tracking_number.clone()),
            tracking_url: shipment.and_then(|s| s.tracking_url),
        }
    }
}

/// Build the order creation payload with Printful's exact wire field names.
fn order_payload(order: &NewProviderOrder) -> Result<serde_json::Value, ProviderApiError> {
    let items = order
        .items
        .iter()
        .map(item_payload)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({
        "external_id": order.order_id.to_string(),
        "recipient": recipient_payload(&order.recipient),
        "items": items,
    }))
}

fn recipient_payload(recipient: &Recipient) -> serde_json::Value {
    json!({
        "name": recipient.name,
        "email": recipient.email,
        "phone": recipient.phone,
        "address1": recipient.address1,
        "address2": recipient.address2,
        "city": recipient.city,
        "state_code": recipient.state_code,
        "country_code": recipient.country_code,
        "zip": recipient.zip,
    })
}

fn item_payload(item: &OrderItem) -> Result<serde_json::Value, ProviderApiError> {
    let sync_variant_id: i64 =
        item.sku
            .parse()
            .map_err(|_| ProviderApiError::InvalidRequest {
                provider: ProviderType::Printful,
                detail: format!("item sku '{}' is not a Printful sync variant id", item.sku),
            })?;

    Ok(json!({
        "sync_variant_id": sync_variant_id,
        "quantity": item.quantity,
        "retail_price": item.retail_price.map(|p| p.to_string()),
    }))
}

#[async_trait]
impl FulfillmentProvider for PrintfulProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Printful
    }

    async fn create_order(&self, order: &NewProviderOrder) -> Result<ProviderOrder, ProviderApiError> {
        let payload = order_payload(order)?;
        let confirm = if self.auto_confirm { "?confirm=true" } else { "" };
        let url = format!("{}/orders{confirm}", self.base_url);

        let response: PrintfulResponse<PrintfulOrder> = self
            .breaker
            .execute(|| async {
                let response = self.client.post(&url).json(&payload).send().await?;
                parse_json(ProviderType::Printful, response).await
            })
            .await
            .map_err(|e| flatten_breaker(ProviderType::Printful, e))?;

        Ok(Self::convert_order(response.result))
    }

    async fn get_order(&self, external_order_id: &str) -> Result<ProviderOrder, ProviderApiError> {
        let url = format!("{}/orders/{external_order_id}", self.base_url);

        let response: PrintfulResponse<PrintfulOrder> = self
            .breaker
            .execute(|| async {
                let response = self.client.get(&url).send().await?;
                parse_json(ProviderType::Printful, response).await
            })
            .await
            .map_err(|e| flatten_breaker(ProviderType::Printful, e))?;

        Ok(Self::convert_order(response.result))
    }

    async fn cancel_order(&self, external_order_id: &str) -> Result<(), ProviderApiError> {
        let url = format!("{}/orders/{external_order_id}", self.base_url);

        let _: PrintfulResponse<serde_json::Value> = self
            .breaker
            .execute(|| async {
                let response = self.client.delete(&url).send().await?;
                parse_json(ProviderType::Printful, response).await
            })
            .await
            .map_err(|e| flatten_breaker(ProviderType::Printful, e))?;

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
            "recipient": recipient_payload(recipient),
            "items": rate_items,
        });
        let url = format!("{}/shipping/rates", self.base_url);

        let response: PrintfulResponse<Vec<PrintfulShippingRate>> = self
            .breaker
            .execute(|| async {
                let response = self.client.post(&url).json(&payload).send().await?;
                parse_json(ProviderType::Printful, response).await
            })
            .await
            .map_err(|e| flatten_breaker(ProviderType::Printful, e))?;

        response
            .result
            .into_iter()
            .map(|rate| {
                let amount: Decimal =
                    rate.rate
                        .parse()
                        .map_err(|_| ProviderApiError::UnexpectedResponse {
                            provider: ProviderType::Printful,
                            detail: format!("non-decimal shipping rate '{}'", rate.rate),
                        })?;
                Ok(ShippingRate {
                    id: rate.id,
                    name: rate.name,
                    rate: amount,
                    currency: rate.currency,
                })
            })
            .collect()
    }

    async fn catalog(&self, page: Option<u32>) -> Result<Vec<CatalogProduct>, ProviderApiError> {
        // Printful's catalog uses offset paging with 20-item pages.
        let offset = page.unwrap_or(0) * 20;
        let url = format!("{}/products?offset={offset}", self.base_url);

        let response: PrintfulResponse<Vec<PrintfulCatalogProduct>> = self
            .breaker
            .execute(|| async {
                let response = self.client.get(&url).send().await?;
                parse_json(ProviderType::Printful, response).await
            })
            .await
            .map_err(|e| flatten_breaker(ProviderType::Printful, e))?;

        Ok(response
            .result
            .into_iter()
            .map(|product| CatalogProduct {
                id: product.id.to_string(),
                name: product.title,
                thumbnail_url: product.image,
            })
            .collect())
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> bool {
        self.webhook_secret
            .as_ref()
            .is_some_and(|secret| verify_hmac_sha256_hex(secret, payload, signature))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use hmac::Mac;
    use pawprint_core::{OrderId, ProviderConfigId, StoreId};

    use super::*;

    fn order() -> NewProviderOrder {
        NewProviderOrder {
            order_id: OrderId::generate(),
            recipient: Recipient {
                name: "Jess Doe".to_string(),
                email: Some("jess@example.com".to_string()),
                phone: None,
                address1: "19 Pine Rd".to_string(),
                address2: None,
                city: "Portland".to_string(),
                state_code: Some("OR".to_string()),
                country_code: "US".to_string(),
                zip: "97201".to_string(),
            },
            items: vec![OrderItem {
                sku: "4242".to_string(),
                quantity: 2,
                retail_price: Some("24.99".parse().expect("valid decimal")),
                name: Some("Pet portrait mug".to_string()),
                attributes: serde_json::Value::Null,
            }],
            shipping_method: None,
        }
    }

    #[test]
    fn test_order_payload_uses_printful_field_names() {
        let order = order();
        let payload = order_payload(&order).expect("valid payload");

        assert_eq!(
            payload["external_id"],
            serde_json::json!(order.order_id.to_string())
        );
        assert_eq!(payload["items"][0]["sync_variant_id"], serde_json::json!(4242));
        assert_eq!(payload["items"][0]["quantity"], serde_json::json!(2));
        assert_eq!(payload["items"][0]["retail_price"], serde_json::json!("24.99"));
        assert_eq!(payload["recipient"]["state_code"], serde_json::json!("OR"));
        assert_eq!(payload["recipient"]["zip"], serde_json::json!("97201"));
    }

    #[test]
    fn test_order_payload_rejects_non_numeric_sku() {
        let mut order = order();
        order.items[0].sku = "MUG-11OZ".to_string();
        let result = order_payload(&order);
        assert!(matches!(
            result,
            Err(ProviderApiError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_order_response_schema() {
        let body = serde_json::json!({
            "code": 200,
            "result": {
                "id": 987654,
                "status": "draft",
                "shipments": [
                    {"tracking_number": "1Z999", "tracking_url": "https://t.example/1Z999"}
                ]
            }
        });
        let parsed: PrintfulResponse<PrintfulOrder> =
            serde_json::from_value(body).expect("schema accepts documented shape");
        let converted = PrintfulProvider::convert_order(parsed.result);
        assert_eq!(converted.external_id, "987654");
        assert_eq!(converted.status, "draft");
        assert_eq!(converted.tracking_number.as_deref(), Some("1Z999"));
    }

    #[test]
    fn test_webhook_verification_round_trip() {
        let config = FulfillmentProviderConfig {
            id: ProviderConfigId::generate(),
            store_id: StoreId::generate(),
            provider: ProviderType::Printful,
            api_key: SecretString::from("pf-key".to_string()),
            api_secret: Some(SecretString::from("pf-webhook-secret".to_string())),
            config: serde_json::json!({}),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let provider = PrintfulProvider::new(
            &config,
            Arc::new(CircuitBreaker::new("printful", crate::resilience::BreakerConfig::default())),
            Duration::from_secs(30),
        )
        .expect("adapter builds");

        let payload = br#"{"type":"package_shipped"}"#;
        let mut mac = hmac::Hmac::<sha2::Sha256>::new_from_slice(b"pf-webhook-secret")
            .expect("valid key length");
        hmac::Mac::update(&mut mac, payload);
        let signature = hex::encode(hmac::Mac::finalize(mac).into_bytes());

        assert!(provider.verify_webhook(payload, &signature));
        assert!(!provider.verify_webhook(payload, "0000"));
    }

    #[test]
    fn test_webhook_rejected_without_secret() {
        let config = FulfillmentProviderConfig {
            id: ProviderConfigId::generate(),
            store_id: StoreId::generate(),
            provider: ProviderType::Printful,
            api_key: SecretString::from("pf-key".to_string()),
            api_secret: None,
            config: serde_json::json!({}),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let provider = PrintfulProvider::new(
            &config,
            Arc::new(CircuitBreaker::new("printful", crate::resilience::BreakerConfig::default())),
            Duration::from_secs(30),
        )
        .expect("adapter builds");

        assert!(!provider.verify_webhook(b"{}", "anything"));
    }
}

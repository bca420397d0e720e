//! Provider config store backed by Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pawprint_core::{ProviderConfigId, ProviderType, StoreId};
use secrecy::SecretString;
use sqlx::PgPool;

use crate::fulfillment::ProviderConfigStore;
use crate::models::FulfillmentProviderConfig;

use super::RepositoryError;

#[derive(sqlx::FromRow)]
struct ProviderConfigRow {
    id: ProviderConfigId,
    store_id: StoreId,
    provider: String,
    api_key: String,
    api_secret: Option<String>,
    config: serde_json::Value,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProviderConfigRow> for FulfillmentProviderConfig {
    type Error = RepositoryError;

    fn try_from(row: ProviderConfigRow) -> Result<Self, Self::Error> {
        let provider = row.provider.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("provider config {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            store_id: row.store_id,
            provider,
            api_key: SecretString::from(row.api_key),
            api_secret: row.api_secret.map(SecretString::from),
            config: row.config,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres-backed [`ProviderConfigStore`].
///
/// One active config per `(store_id, provider)` is enforced by a unique
/// constraint.
#[derive(Clone)]
pub struct PgProviderConfigStore {
    pool: PgPool,
}

impl PgProviderConfigStore {
    /// Create a new store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProviderConfigStore for PgProviderConfigStore {
    async fn active_config(
        &self,
        store_id: StoreId,
        provider: ProviderType,
    ) -> Result<Option<FulfillmentProviderConfig>, RepositoryError> {
        let row = sqlx::query_as::<_, ProviderConfigRow>(
            r"
            SELECT id, store_id, provider, api_key, api_secret, config, is_active,
                   created_at, updated_at
            FROM fulfillment_provider_config
            WHERE store_id = $1 AND provider = $2 AND is_active
            ",
        )
        .bind(store_id)
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}

//! Fulfillment request store backed by Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pawprint_core::{FulfillmentRequestId, FulfillmentStatus, OrderId, ProviderType, StoreId};
use sqlx::PgPool;

use crate::fulfillment::FulfillmentRequestStore;
use crate::models::{FulfillmentRequest, SubmissionPayload};

use super::RepositoryError;

#[derive(sqlx::FromRow)]
struct FulfillmentRequestRow {
    id: FulfillmentRequestId,
    store_id: StoreId,
    order_id: OrderId,
    provider: String,
    status: String,
    external_id: Option<String>,
    error_message: Option<String>,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FulfillmentRequestRow> for FulfillmentRequest {
    type Error = RepositoryError;

    fn try_from(row: FulfillmentRequestRow) -> Result<Self, Self::Error> {
        let corrupt =
            |e: &dyn std::fmt::Display| {
                RepositoryError::DataCorruption(format!("fulfillment request {}: {e}", row.id))
            };

        let provider: ProviderType = row.provider.parse().map_err(|e| corrupt(&e))?;
        let status: FulfillmentStatus = row.status.parse().map_err(|e| corrupt(&e))?;
        let payload: SubmissionPayload =
            serde_json::from_value(row.payload.clone()).map_err(|e| corrupt(&e))?;

        Ok(Self {
            id: row.id,
            store_id: row.store_id,
            order_id: row.order_id,
            provider,
            status,
            external_id: row.external_id,
            error_message: row.error_message,
            payload,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = r"
    SELECT id, store_id, order_id, provider, status, external_id, error_message,
           payload, created_at, updated_at
    FROM fulfillment_request
";

/// Postgres-backed [`FulfillmentRequestStore`]. Rows are never deleted.
#[derive(Clone)]
pub struct PgFulfillmentRequestStore {
    pool: PgPool,
}

impl PgFulfillmentRequestStore {
    /// Create a new store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FulfillmentRequestStore for PgFulfillmentRequestStore {
    async fn insert(&self, request: &FulfillmentRequest) -> Result<(), RepositoryError> {
        let payload = serde_json::to_value(&request.payload).map_err(|e| {
            RepositoryError::DataCorruption(format!("unserializable payload: {e}"))
        })?;

        sqlx::query(
            r"
            INSERT INTO fulfillment_request
                (id, store_id, order_id, provider, status, external_id, error_message,
                 payload, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(request.id)
        .bind(request.store_id)
        .bind(request.order_id)
        .bind(request.provider.as_str())
        .bind(request.status.as_str())
        .bind(request.external_id.as_ref())
        .bind(request.error_message.as_ref())
        .bind(payload)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(
        &self,
        id: FulfillmentRequestId,
    ) -> Result<Option<FulfillmentRequest>, RepositoryError> {
        let row = sqlx::query_as::<_, FulfillmentRequestRow>(&format!(
            "{SELECT_COLUMNS} WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, store_id: StoreId) -> Result<Vec<FulfillmentRequest>, RepositoryError> {
        let rows = sqlx::query_as::<_, FulfillmentRequestRow>(&format!(
            "{SELECT_COLUMNS} WHERE store_id = $1 ORDER BY created_at DESC"
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_by_external_id(
        &self,
        store_id: StoreId,
        provider: ProviderType,
        external_id: &str,
    ) -> Result<Option<FulfillmentRequest>, RepositoryError> {
        let row = sqlx::query_as::<_, FulfillmentRequestRow>(&format!(
            "{SELECT_COLUMNS} WHERE store_id = $1 AND provider = $2 AND external_id = $3"
        ))
        .bind(store_id)
        .bind(provider.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn mark_submitted(
        &self,
        id: FulfillmentRequestId,
        external_id: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE fulfillment_request
            SET status = 'submitted', external_id = $2, error_message = NULL, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(external_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(
        &self,
        id: FulfillmentRequestId,
        error_message: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE fulfillment_request
            SET status = 'failed', error_message = $2, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_status(
        &self,
        id: FulfillmentRequestId,
        status: FulfillmentStatus,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE fulfillment_request
            SET status = $2, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn reset_for_retry(&self, id: FulfillmentRequestId) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE fulfillment_request
            SET status = 'pending', external_id = NULL, error_message = NULL, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

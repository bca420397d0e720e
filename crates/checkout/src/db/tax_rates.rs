//! Tax rate repository.

use chrono::{DateTime, Utc};
use pawprint_core::{StoreId, TaxRateId, TaxZoneId};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::models::{NewTaxRate, TaxRate, UpdateTaxRate};

use super::RepositoryError;

#[derive(sqlx::FromRow)]
struct TaxRateRow {
    id: TaxRateId,
    tax_zone_id: TaxZoneId,
    name: String,
    rate: Decimal,
    rate_type: String,
    applies_to: String,
    compound: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaxRateRow> for TaxRate {
    type Error = RepositoryError;

    fn try_from(row: TaxRateRow) -> Result<Self, Self::Error> {
        let rate_type = row.rate_type.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("tax rate {}: {e}", row.id))
        })?;
        let applies_to = row.applies_to.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("tax rate {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            tax_zone_id: row.tax_zone_id,
            name: row.name,
            rate: row.rate,
            rate_type,
            applies_to,
            compound: row.compound,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for tax rates within a zone.
///
/// Store scoping is enforced one level up: routes resolve the zone through
/// [`super::TaxZoneRepository`] before touching rates.
pub struct TaxRateRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TaxRateRepository<'a> {
    /// Create a new repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a rate in a zone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        tax_zone_id: TaxZoneId,
        input: &NewTaxRate,
    ) -> Result<TaxRate, RepositoryError> {
        let row = sqlx::query_as::<_, TaxRateRow>(
            r"
            INSERT INTO tax_rate (id, tax_zone_id, name, rate, rate_type, applies_to, compound)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, tax_zone_id, name, rate, rate_type, applies_to, compound,
                      created_at, updated_at
            ",
        )
        .bind(TaxRateId::generate())
        .bind(tax_zone_id)
        .bind(&input.name)
        .bind(input.rate)
        .bind(input.rate_type.as_str())
        .bind(input.applies_to.as_str())
        .bind(input.compound)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// All rates in a zone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` or `DataCorruption`.
    pub async fn list_for_zone(
        &self,
        tax_zone_id: TaxZoneId,
    ) -> Result<Vec<TaxRate>, RepositoryError> {
        let rows = sqlx::query_as::<_, TaxRateRow>(
            r"
            SELECT id, tax_zone_id, name, rate, rate_type, applies_to, compound,
                   created_at, updated_at
            FROM tax_rate
            WHERE tax_zone_id = $1
            ORDER BY created_at
            ",
        )
        .bind(tax_zone_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// All rates across a store's zones, for the calculator.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` or `DataCorruption`.
    pub async fn list_for_store(&self, store_id: StoreId) -> Result<Vec<TaxRate>, RepositoryError> {
        let rows = sqlx::query_as::<_, TaxRateRow>(
            r"
            SELECT r.id, r.tax_zone_id, r.name, r.rate, r.rate_type, r.applies_to, r.compound,
                   r.created_at, r.updated_at
            FROM tax_rate r
            JOIN tax_zone z ON z.id = r.tax_zone_id
            WHERE z.store_id = $1
            ORDER BY r.created_at
            ",
        )
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Update a rate; `None` fields keep their current value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` or `DataCorruption`.
    pub async fn update(
        &self,
        tax_zone_id: TaxZoneId,
        rate_id: TaxRateId,
        input: &UpdateTaxRate,
    ) -> Result<Option<TaxRate>, RepositoryError> {
        let row = sqlx::query_as::<_, TaxRateRow>(
            r"
            UPDATE tax_rate
            SET name = COALESCE($3, name),
                rate = COALESCE($4, rate),
                rate_type = COALESCE($5, rate_type),
                applies_to = COALESCE($6, applies_to),
                compound = COALESCE($7, compound),
                updated_at = now()
            WHERE tax_zone_id = $1 AND id = $2
            RETURNING id, tax_zone_id, name, rate, rate_type, applies_to, compound,
                      created_at, updated_at
            ",
        )
        .bind(tax_zone_id)
        .bind(rate_id)
        .bind(input.name.as_ref())
        .bind(input.rate)
        .bind(input.rate_type.map(|t| t.as_str()))
        .bind(input.applies_to.map(|a| a.as_str()))
        .bind(input.compound)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Delete a rate.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(
        &self,
        tax_zone_id: TaxZoneId,
        rate_id: TaxRateId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM tax_rate WHERE tax_zone_id = $1 AND id = $2")
            .bind(tax_zone_id)
            .bind(rate_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

//! Tax zone repository.

use chrono::{DateTime, Utc};
use pawprint_core::{Address, StoreId, TaxZoneId};
use sqlx::PgPool;

use crate::models::{NewTaxZone, TaxRate, TaxZone, UpdateTaxZone};

use super::tax_rates::TaxRateRepository;
use super::RepositoryError;

#[derive(sqlx::FromRow)]
struct TaxZoneRow {
    id: TaxZoneId,
    store_id: StoreId,
    name: String,
    countries: Vec<String>,
    regions: Vec<String>,
    postal_codes: Vec<String>,
    priority: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TaxZoneRow> for TaxZone {
    fn from(row: TaxZoneRow) -> Self {
        Self {
            id: row.id,
            store_id: row.store_id,
            name: row.name,
            countries: row.countries,
            regions: row.regions,
            postal_codes: row.postal_codes,
            priority: row.priority,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for tax zone CRUD and address matching, scoped by store.
pub struct TaxZoneRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TaxZoneRepository<'a> {
    /// Create a new repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a zone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        store_id: StoreId,
        input: &NewTaxZone,
    ) -> Result<TaxZone, RepositoryError> {
        let row = sqlx::query_as::<_, TaxZoneRow>(
            r"
            INSERT INTO tax_zone (id, store_id, name, countries, regions, postal_codes, priority)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, store_id, name, countries, regions, postal_codes, priority,
                      created_at, updated_at
            ",
        )
        .bind(TaxZoneId::generate())
        .bind(store_id)
        .bind(&input.name)
        .bind(&input.countries)
        .bind(&input.regions)
        .bind(&input.postal_codes)
        .bind(input.priority)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Get a zone by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        store_id: StoreId,
        id: TaxZoneId,
    ) -> Result<Option<TaxZone>, RepositoryError> {
        let row = sqlx::query_as::<_, TaxZoneRow>(
            r"
            SELECT id, store_id, name, countries, regions, postal_codes, priority,
                   created_at, updated_at
            FROM tax_zone
            WHERE store_id = $1 AND id = $2
            ",
        )
        .bind(store_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// All zones for a store, highest priority first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, store_id: StoreId) -> Result<Vec<TaxZone>, RepositoryError> {
        let rows = sqlx::query_as::<_, TaxZoneRow>(
            r"
            SELECT id, store_id, name, countries, regions, postal_codes, priority,
                   created_at, updated_at
            FROM tax_zone
            WHERE store_id = $1
            ORDER BY priority DESC, created_at
            ",
        )
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Update a zone; `None` fields keep their current value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(
        &self,
        store_id: StoreId,
        id: TaxZoneId,
        input: &UpdateTaxZone,
    ) -> Result<Option<TaxZone>, RepositoryError> {
        let row = sqlx::query_as::<_, TaxZoneRow>(
            r"
            UPDATE tax_zone
            SET name = COALESCE($3, name),
                countries = COALESCE($4, countries),
                regions = COALESCE($5, regions),
                postal_codes = COALESCE($6, postal_codes),
                priority = COALESCE($7, priority),
                updated_at = now()
            WHERE store_id = $1 AND id = $2
            RETURNING id, store_id, name, countries, regions, postal_codes, priority,
                      created_at, updated_at
            ",
        )
        .bind(store_id)
        .bind(id)
        .bind(input.name.as_ref())
        .bind(input.countries.as_ref())
        .bind(input.regions.as_ref())
        .bind(input.postal_codes.as_ref())
        .bind(input.priority)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Delete a zone (its rates cascade).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, store_id: StoreId, id: TaxZoneId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM tax_zone WHERE store_id = $1 AND id = $2")
            .bind(store_id)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Zones applying to `address`, highest priority first.
    ///
    /// Matching runs in Rust over the store's zone set so the predicate is
    /// shared with the calculator ([`TaxZone::matches`]).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_for_address(
        &self,
        store_id: StoreId,
        address: &Address,
    ) -> Result<Vec<TaxZone>, RepositoryError> {
        let zones = self.list(store_id).await?;
        Ok(zones.into_iter().filter(|z| z.matches(address)).collect())
    }

    /// Every zone for a store paired with its rates, for the calculator.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` or `DataCorruption` if loading
    /// fails.
    pub async fn zones_with_rates(
        &self,
        store_id: StoreId,
    ) -> Result<Vec<(TaxZone, Vec<TaxRate>)>, RepositoryError> {
        let zones = self.list(store_id).await?;
        let rates = TaxRateRepository::new(self.pool)
            .list_for_store(store_id)
            .await?;

        Ok(zones
            .into_iter()
            .map(|zone| {
                let zone_rates = rates
                    .iter()
                    .filter(|rate| rate.tax_zone_id == zone.id)
                    .cloned()
                    .collect();
                (zone, zone_rates)
            })
            .collect())
    }
}

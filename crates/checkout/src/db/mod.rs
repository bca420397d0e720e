//! Database operations for the checkout `PostgreSQL` database.
//!
//! # Database: `pawprint_checkout`
//!
//! ## Tables
//!
//! - `tax_zone` - jurisdiction definitions per store
//! - `tax_rate` - percentage rates within a zone
//! - `fulfillment_provider_config` - provider credentials per `(store, type)`
//! - `fulfillment_request` - durable dispatch state per order
//!
//! Queries are runtime-checked (`query_as` over `FromRow` rows); enum-valued
//! columns are stored as TEXT and re-parsed on read, with unparseable rows
//! surfacing as [`RepositoryError::DataCorruption`].
//!
//! # Migrations
//!
//! Migrations live in `crates/checkout/migrations/` and are applied on
//! service startup via `sqlx::migrate!`.

mod fulfillment_requests;
mod provider_configs;
mod tax_rates;
mod tax_zones;

pub use fulfillment_requests::PgFulfillmentRequestStore;
pub use provider_configs::PgProviderConfigStore;
pub use tax_rates::TaxRateRepository;
pub use tax_zones::TaxZoneRepository;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row failed to parse back into its domain type.
    #[error("Data corruption: {0}")]
    DataCorruption(String),

    /// Referenced row does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violated.
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

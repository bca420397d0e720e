//! Tax zones and rates.
//!
//! A zone is a named jurisdiction definition (countries/regions/postal codes
//! plus a priority); a rate is a percentage within a zone tagged with the
//! item category it covers and whether it compounds.

use chrono::{DateTime, Utc};
use pawprint_core::{Address, StoreId, TaxAppliesTo, TaxRateId, TaxRateType, TaxZoneId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Validation failures on zone/rate input.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TaxInputError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("rate must be non-negative")]
    NegativeRate,
}

/// A jurisdiction definition used to select applicable tax rates for an
/// address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxZone {
    pub id: TaxZoneId,
    pub store_id: StoreId,
    pub name: String,
    /// ISO 3166-1 alpha-2 codes. Empty means "any country".
    pub countries: Vec<String>,
    /// State/province codes. Empty means "any region".
    pub regions: Vec<String>,
    /// Exact postal code strings. Empty means "any postal code".
    pub postal_codes: Vec<String>,
    /// Higher priority zones sort first when resolving an address.
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaxZone {
    /// Whether this zone applies to `address`.
    ///
    /// All three dimensions must be satisfied independently. An empty list on
    /// a dimension is a wildcard (no restriction), not "matches nothing".
    /// Comparisons are case-insensitive; postal codes are exact strings, no
    /// prefix or wildcard matching.
    #[must_use]
    pub fn matches(&self, address: &Address) -> bool {
        let country_ok = self.countries.is_empty()
            || self
                .countries
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&address.country));

        let region_ok = self.regions.is_empty()
            || address
                .state
                .as_ref()
                .is_some_and(|state| self.regions.iter().any(|r| r.eq_ignore_ascii_case(state)));

        let postal_ok = self.postal_codes.is_empty()
            || address
                .zip
                .as_ref()
                .is_some_and(|zip| self.postal_codes.iter().any(|p| p.eq_ignore_ascii_case(zip)));

        country_ok && region_ok && postal_ok
    }
}

/// A percentage rate within a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate {
    pub id: TaxRateId,
    pub tax_zone_id: TaxZoneId,
    pub name: String,
    /// Percentage, e.g. `8.875` for 8.875%. Never negative.
    pub rate: Decimal,
    /// Informational only; never changes the math.
    pub rate_type: TaxRateType,
    pub applies_to: TaxAppliesTo,
    /// Compound rates are computed on the base amount plus tax already
    /// accumulated on the same item.
    pub compound: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a zone.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTaxZone {
    pub name: String,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub postal_codes: Vec<String>,
    #[serde(default)]
    pub priority: i32,
}

impl NewTaxZone {
    /// # Errors
    ///
    /// Returns [`TaxInputError::EmptyName`] when the name is blank.
    pub fn validate(&self) -> Result<(), TaxInputError> {
        if self.name.trim().is_empty() {
            return Err(TaxInputError::EmptyName);
        }
        Ok(())
    }
}

/// Input for updating a zone. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaxZone {
    pub name: Option<String>,
    pub countries: Option<Vec<String>>,
    pub regions: Option<Vec<String>>,
    pub postal_codes: Option<Vec<String>>,
    pub priority: Option<i32>,
}

impl UpdateTaxZone {
    /// # Errors
    ///
    /// Returns [`TaxInputError::EmptyName`] when a blank name is supplied.
    pub fn validate(&self) -> Result<(), TaxInputError> {
        if self.name.as_ref().is_some_and(|n| n.trim().is_empty()) {
            return Err(TaxInputError::EmptyName);
        }
        Ok(())
    }
}

/// Input for creating a rate within a zone.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTaxRate {
    pub name: String,
    pub rate: Decimal,
    #[serde(default, rename = "type")]
    pub rate_type: TaxRateType,
    #[serde(default)]
    pub applies_to: TaxAppliesTo,
    #[serde(default)]
    pub compound: bool,
}

impl NewTaxRate {
    /// # Errors
    ///
    /// Returns [`TaxInputError`] on a blank name or negative rate.
    pub fn validate(&self) -> Result<(), TaxInputError> {
        if self.name.trim().is_empty() {
            return Err(TaxInputError::EmptyName);
        }
        if self.rate < Decimal::ZERO {
            return Err(TaxInputError::NegativeRate);
        }
        Ok(())
    }
}

/// Input for updating a rate. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaxRate {
    pub name: Option<String>,
    pub rate: Option<Decimal>,
    #[serde(default, rename = "type")]
    pub rate_type: Option<TaxRateType>,
    pub applies_to: Option<TaxAppliesTo>,
    pub compound: Option<bool>,
}

impl UpdateTaxRate {
    /// # Errors
    ///
    /// Returns [`TaxInputError`] on a blank name or negative rate.
    pub fn validate(&self) -> Result<(), TaxInputError> {
        if self.name.as_ref().is_some_and(|n| n.trim().is_empty()) {
            return Err(TaxInputError::EmptyName);
        }
        if self.rate.is_some_and(|r| r < Decimal::ZERO) {
            return Err(TaxInputError::NegativeRate);
        }
        Ok(())
    }
}

//! Shipping/billing address as consumed by tax zone matching.

use serde::{Deserialize, Serialize};

/// The address dimensions tax zones match against.
///
/// Only the jurisdiction-relevant fields live here; street lines and contact
/// details belong to the fulfillment recipient, not the tax engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// ISO 3166-1 alpha-2 country code (e.g. "US", "CA").
    pub country: String,
    /// State or province code (e.g. "NY", "BC").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Postal/ZIP code, matched as an exact string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
}

impl Address {
    /// Convenience constructor for a country-only address.
    #[must_use]
    pub fn country(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            state: None,
            zip: None,
        }
    }

    /// Convenience constructor with all three dimensions.
    #[must_use]
    pub fn new(
        country: impl Into<String>,
        state: Option<impl Into<String>>,
        zip: Option<impl Into<String>>,
    ) -> Self {
        Self {
            country: country.into(),
            state: state.map(Into::into),
            zip: zip.map(Into::into),
        }
    }
}

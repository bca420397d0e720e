//! Closed enums for fulfillment and tax domain values.
//!
//! All enums here serialize as `snake_case` strings and round-trip through
//! `Display`/`FromStr`, which is also how they are stored in Postgres (plain
//! TEXT columns, re-parsed on read).

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when parsing a status string from the database or an API
/// payload fails.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseStatusError {
    /// Which enum failed to parse.
    pub kind: &'static str,
    /// The offending input.
    pub value: String,
}

/// Supported print-on-demand fulfillment providers.
///
/// This is a closed set: adding or removing a provider is a compile-time
/// change, enforced by exhaustive matches in the provider registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    Printful,
    Gooten,
    Prodigi,
    Shapeways,
}

impl ProviderType {
    /// Every supported provider, in declaration order.
    pub const ALL: [Self; 4] = [Self::Printful, Self::Gooten, Self::Prodigi, Self::Shapeways];

    /// The canonical lowercase name used in URLs, config rows, and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Printful => "printful",
            Self::Gooten => "gooten",
            Self::Prodigi => "prodigi",
            Self::Shapeways => "shapeways",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "printful" => Ok(Self::Printful),
            "gooten" => Ok(Self::Gooten),
            "prodigi" => Ok(Self::Prodigi),
            "shapeways" => Ok(Self::Shapeways),
            other => Err(ParseStatusError {
                kind: "provider type",
                value: other.to_string(),
            }),
        }
    }
}

/// Lifecycle of a fulfillment request.
///
/// This enum is the authoritative state for business logic. Provider-reported
/// status strings are opaque display values and never feed into transitions
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    /// Created, waiting for the background worker to submit it.
    #[default]
    Pending,
    /// Accepted by the provider; `external_id` is set.
    Submitted,
    /// Provider reported the package shipped.
    Shipped,
    /// Provider reported delivery.
    Delivered,
    /// Submission failed; `error_message` is set.
    Failed,
    /// Cancelled by an operator.
    Cancelled,
}

impl FulfillmentStatus {
    /// Whether an operator may retry a request in this status.
    #[must_use]
    pub const fn can_retry(self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }

    /// Whether an operator may cancel a request in this status.
    ///
    /// Cancelling only changes the persisted row; it does not abort an
    /// in-flight provider call.
    #[must_use]
    pub const fn can_cancel(self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FulfillmentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "submitted" => Ok(Self::Submitted),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ParseStatusError {
                kind: "fulfillment status",
                value: other.to_string(),
            }),
        }
    }
}

/// Informational category of a tax rate. Never changes the math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaxRateType {
    #[default]
    SalesTax,
    Vat,
    Gst,
}

impl TaxRateType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SalesTax => "sales_tax",
            Self::Vat => "vat",
            Self::Gst => "gst",
        }
    }
}

impl fmt::Display for TaxRateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaxRateType {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sales_tax" => Ok(Self::SalesTax),
            "vat" => Ok(Self::Vat),
            "gst" => Ok(Self::Gst),
            other => Err(ParseStatusError {
                kind: "tax rate type",
                value: other.to_string(),
            }),
        }
    }
}

/// Which item category a tax rate applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaxAppliesTo {
    #[default]
    All,
    Physical,
    Digital,
    Shipping,
}

impl TaxAppliesTo {
    /// Whether a line item with the given product type is covered by this
    /// rate. `All` matches every type; otherwise it is exact string equality
    /// against the lowercase category name.
    #[must_use]
    pub fn covers(self, product_type: &str) -> bool {
        match self {
            Self::All => true,
            other => other.as_str() == product_type,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Physical => "physical",
            Self::Digital => "digital",
            Self::Shipping => "shipping",
        }
    }
}

impl fmt::Display for TaxAppliesTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaxAppliesTo {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "physical" => Ok(Self::Physical),
            "digital" => Ok(Self::Digital),
            "shipping" => Ok(Self::Shipping),
            other => Err(ParseStatusError {
                kind: "tax applies-to",
                value: other.to_string(),
            }),
        }
    }
}

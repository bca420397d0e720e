//! Domain models persisted by the checkout service.

pub mod fulfillment;
pub mod tax;

pub use fulfillment::{
    CatalogProduct, FulfillmentProviderConfig, FulfillmentRequest, NewFulfillmentRequest,
    NewProviderOrder, OrderItem, ProviderOrder, Recipient, ShippingRate, SubmissionPayload,
};
pub use tax::{NewTaxRate, NewTaxZone, TaxInputError, TaxRate, TaxZone, UpdateTaxRate, UpdateTaxZone};

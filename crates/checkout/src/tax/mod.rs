//! Tax computation engine.
//!
//! Zone and rate definitions live in [`crate::models::tax`] and are stored by
//! [`crate::db`]; the calculator here is a pure function over already-fetched
//! data.

mod calculator;

pub use calculator::{calculate_tax, LineItem, TaxBreakdown, TaxLine, SHIPPING_ITEM_ID};

//! End-to-end tax calculation scenarios over realistic zone/rate sets.

use chrono::Utc;
use pawprint_checkout::models::{TaxRate, TaxZone};
use pawprint_checkout::tax::{calculate_tax, LineItem, SHIPPING_ITEM_ID};
use pawprint_core::{Address, StoreId, TaxAppliesTo, TaxRateId, TaxRateType, TaxZoneId};
use rust_decimal::Decimal;

fn dec(s: &str) -> Decimal {
    s.parse().expect("valid decimal")
}

struct ZoneBuilder {
    zone: TaxZone,
    rates: Vec<TaxRate>,
}

impl ZoneBuilder {
    fn new(store_id: StoreId, name: &str, priority: i32) -> Self {
        Self {
            zone: TaxZone {
                id: TaxZoneId::generate(),
                store_id,
                name: name.to_string(),
                countries: vec![],
                regions: vec![],
                postal_codes: vec![],
                priority,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            rates: vec![],
        }
    }

    fn countries(mut self, countries: &[&str]) -> Self {
        self.zone.countries = countries.iter().map(ToString::to_string).collect();
        self
    }

    fn regions(mut self, regions: &[&str]) -> Self {
        self.zone.regions = regions.iter().map(ToString::to_string).collect();
        self
    }

    fn rate(mut self, name: &str, rate: &str, applies_to: TaxAppliesTo, compound: bool) -> Self {
        self.rates.push(TaxRate {
            id: TaxRateId::generate(),
            tax_zone_id: self.zone.id,
            name: name.to_string(),
            rate: dec(rate),
            rate_type: TaxRateType::SalesTax,
            applies_to,
            compound,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        self
    }

    fn build(self) -> (TaxZone, Vec<TaxRate>) {
        (self.zone, self.rates)
    }
}

fn item(id: &str, amount: &str) -> LineItem {
    LineItem {
        id: id.to_string(),
        amount: dec(amount),
        product_type: "physical".to_string(),
    }
}

#[test]
fn single_rate_on_single_item() {
    // Scenario A: one matching zone, 8% non-compound, amount 100 -> 8.00.
    let store_id = StoreId::generate();
    let zones = vec![
        ZoneBuilder::new(store_id, "US", 0)
            .countries(&["US"])
            .rate("State sales tax", "8", TaxAppliesTo::All, false)
            .build(),
    ];

    let breakdown = calculate_tax(
        &[item("mug-1", "100")],
        Decimal::ZERO,
        &Address::country("US"),
        &zones,
    );

    assert_eq!(breakdown.total_tax, dec("8.00"));
    assert_eq!(breakdown.lines[0].tax_amount, dec("8.00"));
}

#[test]
fn overlapping_zones_both_contribute() {
    // Scenario B: country-wide 8% plus a narrower compound 1.5%;
    // 8 + round(1.5% * 108, 2) = 9.62.
    let store_id = StoreId::generate();
    let zones = vec![
        ZoneBuilder::new(store_id, "US federal", 0)
            .countries(&["US"])
            .rate("Base", "8", TaxAppliesTo::All, false)
            .build(),
        ZoneBuilder::new(store_id, "NY surcharge", 10)
            .countries(&["US"])
            .regions(&["NY"])
            .rate("Metro surcharge", "1.5", TaxAppliesTo::All, true)
            .build(),
    ];

    let breakdown = calculate_tax(
        &[item("portrait-1", "100")],
        Decimal::ZERO,
        &Address::new("US", Some("NY"), Some("10001")),
        &zones,
    );

    assert_eq!(breakdown.total_tax, dec("9.62"));
}

#[test]
fn unmatched_address_is_zero_tax_with_none_lines() {
    // Scenario C: no zone matches; a valid zero-tax outcome, not an error.
    let store_id = StoreId::generate();
    let zones = vec![
        ZoneBuilder::new(store_id, "US", 0)
            .countries(&["US"])
            .rate("Base", "8", TaxAppliesTo::All, false)
            .build(),
    ];

    let breakdown = calculate_tax(
        &[item("mug-1", "100"), item("leash-2", "35.50")],
        dec("4.99"),
        &Address::new("JP", Some("13"), None::<String>),
        &zones,
    );

    assert_eq!(breakdown.total_tax, Decimal::ZERO);
    assert_eq!(breakdown.lines.len(), 3); // two items + shipping line
    for line in &breakdown.lines {
        assert_eq!(line.tax_amount, Decimal::ZERO);
        assert_eq!(line.tax_type, "none");
    }
}

#[test]
fn wildcard_zone_matches_every_address() {
    let store_id = StoreId::generate();
    let zones = vec![
        ZoneBuilder::new(store_id, "Everywhere", 0)
            .rate("Global", "10", TaxAppliesTo::All, false)
            .build(),
    ];

    for address in [
        Address::country("US"),
        Address::new("DE", Some("BY"), Some("80331")),
        Address::country("AU"),
    ] {
        let breakdown = calculate_tax(&[item("x", "10")], Decimal::ZERO, &address, &zones);
        assert_eq!(breakdown.total_tax, dec("1.00"));
    }
}

#[test]
fn shipping_taxed_only_by_shipping_rates() {
    let store_id = StoreId::generate();
    let zones = vec![
        ZoneBuilder::new(store_id, "US", 0)
            .countries(&["US"])
            .rate("Goods", "8", TaxAppliesTo::Physical, false)
            .rate("Shipping", "4", TaxAppliesTo::Shipping, false)
            .build(),
    ];

    let breakdown = calculate_tax(
        &[item("mug-1", "100")],
        dec("10"),
        &Address::country("US"),
        &zones,
    );

    let shipping = breakdown
        .lines
        .iter()
        .find(|l| l.item_id == SHIPPING_ITEM_ID)
        .expect("shipping line");
    assert_eq!(shipping.tax_amount, dec("0.40"));
    assert_eq!(breakdown.lines[0].tax_amount, dec("8.00"));
    assert_eq!(breakdown.total_tax, dec("8.40"));
}

#[test]
fn calculation_is_deterministic() {
    let store_id = StoreId::generate();
    let zones = vec![
        ZoneBuilder::new(store_id, "CA", 0)
            .countries(&["CA"])
            .rate("GST", "5", TaxAppliesTo::All, false)
            .rate("PST", "7", TaxAppliesTo::All, false)
            .rate("Compound levy", "2", TaxAppliesTo::All, true)
            .build(),
    ];
    let items = [item("a", "19.99"), item("b", "250")];
    let address = Address::new("CA", Some("BC"), Some("V6B 1A1"));

    let first = calculate_tax(&items, dec("12.34"), &address, &zones);
    for _ in 0..10 {
        let again = calculate_tax(&items, dec("12.34"), &address, &zones);
        assert_eq!(again, first);
    }
}

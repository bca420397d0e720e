//! Compound tax calculation over matched zones.
//!
//! Pure and referentially transparent: identical input always yields
//! identical output. The only inputs are the line items, the shipping
//! amount, the destination address, and the candidate zones with their
//! rates; there is no I/O and no shared mutable state.

use pawprint_core::{round_money, Address};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{TaxRate, TaxZone};

/// Synthetic item id used for the shipping line.
pub const SHIPPING_ITEM_ID: &str = "__shipping__";

const ONE_HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// One taxable line of a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: String,
    pub amount: Decimal,
    /// Free-form category; rates with `applies_to != all` match it by exact
    /// string equality.
    pub product_type: String,
}

/// Computed tax for one line.
///
/// `rate` and `tax_type` reflect only the first applicable rate found for the
/// item - a display convenience, not a blended effective rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxLine {
    pub item_id: String,
    pub tax_amount: Decimal,
    pub rate: Decimal,
    pub tax_type: String,
}

/// The full result of a tax calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBreakdown {
    pub total_tax: Decimal,
    pub lines: Vec<TaxLine>,
}

/// Compute tax for a set of line items shipped to `address`.
///
/// `zones` is the store's full zone set with each zone's rates; matching
/// happens here so the function stays self-contained. All matching zones
/// contribute their rates simultaneously (a country-wide zone and an
/// overlapping state zone both apply); there is no most-specific-wins
/// exclusivity.
///
/// Rate application order: all non-compound rates precede all compound rates
/// (stable sort, no further ordering guarantee within each group).
/// Non-compound rates are computed against the original item amount;
/// compound rates against the original amount plus tax already accumulated
/// on the same item, including tax from earlier compound rates.
///
/// An address no zone matches is a legitimate zero-tax result, not an error.
#[must_use]
pub fn calculate_tax(
    line_items: &[LineItem],
    shipping_amount: Decimal,
    address: &Address,
    zones: &[(TaxZone, Vec<TaxRate>)],
) -> TaxBreakdown {
    let mut items: Vec<LineItem> = line_items.to_vec();
    if shipping_amount > Decimal::ZERO {
        items.push(LineItem {
            id: SHIPPING_ITEM_ID.to_string(),
            amount: shipping_amount,
            product_type: "shipping".to_string(),
        });
    }

    let rates = applicable_rates(address, zones);

    let mut lines = Vec::with_capacity(items.len());
    let mut total = Decimal::ZERO;

    for item in &items {
        let line = tax_line_for_item(item, &rates);
        total += line.tax_amount;
        lines.push(line);
    }

    TaxBreakdown {
        total_tax: round_money(total),
        lines,
    }
}

/// Union of rates from every zone matching `address`, zones ordered by
/// priority descending, non-compound rates before compound ones.
fn applicable_rates<'a>(
    address: &Address,
    zones: &'a [(TaxZone, Vec<TaxRate>)],
) -> Vec<&'a TaxRate> {
    let mut matching: Vec<&(TaxZone, Vec<TaxRate>)> = zones
        .iter()
        .filter(|(zone, _)| zone.matches(address))
        .collect();
    matching.sort_by_key(|(zone, _)| std::cmp::Reverse(zone.priority));

    let mut rates: Vec<&TaxRate> = matching
        .iter()
        .flat_map(|(_, zone_rates)| zone_rates.iter())
        .collect();
    rates.sort_by_key(|rate| rate.compound);
    rates
}

fn tax_line_for_item(item: &LineItem, rates: &[&TaxRate]) -> TaxLine {
    let mut accumulated = Decimal::ZERO;
    let mut first_applied: Option<&TaxRate> = None;

    for rate in rates {
        if !rate.applies_to.covers(&item.product_type) {
            continue;
        }

        let base = if rate.compound {
            item.amount + accumulated
        } else {
            item.amount
        };
        accumulated += base * rate.rate / ONE_HUNDRED;

        if first_applied.is_none() {
            first_applied = Some(rate);
        }
    }

    TaxLine {
        item_id: item.id.clone(),
        tax_amount: round_money(accumulated),
        rate: first_applied.map_or(Decimal::ZERO, |r| r.rate),
        tax_type: first_applied.map_or_else(|| "none".to_string(), |r| r.rate_type.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pawprint_core::{StoreId, TaxAppliesTo, TaxRateId, TaxRateType, TaxZoneId};

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().expect("valid decimal")
    }

    fn zone(name: &str, countries: &[&str], regions: &[&str], priority: i32) -> TaxZone {
        TaxZone {
            id: TaxZoneId::generate(),
            store_id: StoreId::generate(),
            name: name.to_string(),
            countries: countries.iter().map(ToString::to_string).collect(),
            regions: regions.iter().map(ToString::to_string).collect(),
            postal_codes: vec![],
            priority,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn rate(zone: &TaxZone, rate: &str, applies_to: TaxAppliesTo, compound: bool) -> TaxRate {
        TaxRate {
            id: TaxRateId::generate(),
            tax_zone_id: zone.id,
            name: format!("{rate}%"),
            rate: dec(rate),
            rate_type: TaxRateType::SalesTax,
            applies_to,
            compound,
            created_at: Utc::now(),
            updated_at: Utc::now(),
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
    fn test_single_non_compound_rate() {
        // Scenario A: one zone, 8% on everything, item amount 100.
        let z = zone("US", &["US"], &[], 0);
        let r = rate(&z, "8", TaxAppliesTo::All, false);
        let zones = vec![(z, vec![r])];

        let breakdown = calculate_tax(
            &[item("item-1", "100")],
            Decimal::ZERO,
            &Address::country("US"),
            &zones,
        );

        assert_eq!(breakdown.total_tax, dec("8.00"));
        assert_eq!(breakdown.lines.len(), 1);
        assert_eq!(breakdown.lines[0].tax_amount, dec("8.00"));
        assert_eq!(breakdown.lines[0].rate, dec("8"));
        assert_eq!(breakdown.lines[0].tax_type, "sales_tax");
    }

    #[test]
    fn test_overlapping_zones_union_with_compound() {
        // Scenario B: country-wide 8% non-compound plus a narrower
        // higher-priority 1.5% compound zone; both contribute.
        let country = zone("US", &["US"], &[], 0);
        let state = zone("US-NY", &["US"], &["NY"], 10);
        let zones = vec![
            (country.clone(), vec![rate(&country, "8", TaxAppliesTo::All, false)]),
            (state.clone(), vec![rate(&state, "1.5", TaxAppliesTo::All, true)]),
        ];

        let breakdown = calculate_tax(
            &[item("item-1", "100")],
            Decimal::ZERO,
            &Address::new("US", Some("NY"), None::<String>),
            &zones,
        );

        // 8 + 1.5% of (100 + 8) = 8 + 1.62 = 9.62
        assert_eq!(breakdown.total_tax, dec("9.62"));
        assert_eq!(breakdown.lines[0].tax_amount, dec("9.62"));
        // Display fields reflect the first applicable rate only.
        assert_eq!(breakdown.lines[0].rate, dec("8"));
    }

    #[test]
    fn test_no_matching_zone_is_zero_tax() {
        // Scenario C: nothing matches, which is a valid outcome.
        let z = zone("US", &["US"], &[], 0);
        let zones = vec![(z.clone(), vec![rate(&z, "8", TaxAppliesTo::All, false)])];

        let breakdown = calculate_tax(
            &[item("item-1", "100"), item("item-2", "50")],
            Decimal::ZERO,
            &Address::country("FR"),
            &zones,
        );

        assert_eq!(breakdown.total_tax, Decimal::ZERO);
        for line in &breakdown.lines {
            assert_eq!(line.tax_amount, Decimal::ZERO);
            assert_eq!(line.rate, Decimal::ZERO);
            assert_eq!(line.tax_type, "none");
        }
    }

    #[test]
    fn test_non_compound_rates_sum_independently() {
        let z = zone("CA", &["CA"], &[], 0);
        let zones = vec![(
            z.clone(),
            vec![
                rate(&z, "5", TaxAppliesTo::All, false),
                rate(&z, "10", TaxAppliesTo::All, false),
            ],
        )];

        let breakdown = calculate_tax(
            &[item("item-1", "100")],
            Decimal::ZERO,
            &Address::country("CA"),
            &zones,
        );

        // Both computed against the original amount: 5 + 10, not 5 + 10.5.
        assert_eq!(breakdown.total_tax, dec("15.00"));
    }

    #[test]
    fn test_multiple_compound_rates_compound_sequentially() {
        let z = zone("CA", &["CA"], &[], 0);
        let zones = vec![(
            z.clone(),
            vec![
                rate(&z, "10", TaxAppliesTo::All, false),
                rate(&z, "5", TaxAppliesTo::All, true),
                rate(&z, "2", TaxAppliesTo::All, true),
            ],
        )];

        let breakdown = calculate_tax(
            &[item("item-1", "100")],
            Decimal::ZERO,
            &Address::country("CA"),
            &zones,
        );

        // 10, then 5% of 110 = 5.5, then 2% of 115.5 = 2.31 -> 17.81.
        // The second compound rate sees tax from the first compound rate.
        assert_eq!(breakdown.total_tax, dec("17.81"));
    }

    #[test]
    fn test_shipping_amount_becomes_synthetic_item() {
        let z = zone("US", &["US"], &[], 0);
        let zones = vec![(
            z.clone(),
            vec![rate(&z, "7", TaxAppliesTo::Shipping, false)],
        )];

        let breakdown = calculate_tax(
            &[item("item-1", "100")],
            dec("12.50"),
            &Address::country("US"),
            &zones,
        );

        assert_eq!(breakdown.lines.len(), 2);
        let shipping_line = breakdown
            .lines
            .iter()
            .find(|l| l.item_id == SHIPPING_ITEM_ID)
            .expect("shipping line present");
        // 7% of 12.50 = 0.875 -> 0.88; the physical item is untouched.
        assert_eq!(shipping_line.tax_amount, dec("0.88"));
        assert_eq!(breakdown.lines[0].tax_amount, Decimal::ZERO);
        assert_eq!(breakdown.total_tax, dec("0.88"));
    }

    #[test]
    fn test_zero_shipping_adds_no_line() {
        let zones = vec![];
        let breakdown = calculate_tax(
            &[item("item-1", "100")],
            Decimal::ZERO,
            &Address::country("US"),
            &zones,
        );
        assert_eq!(breakdown.lines.len(), 1);
    }

    #[test]
    fn test_applies_to_filters_by_product_type() {
        let z = zone("US", &["US"], &[], 0);
        let zones = vec![(
            z.clone(),
            vec![rate(&z, "20", TaxAppliesTo::Digital, false)],
        )];

        let mut digital = item("ebook-1", "10");
        digital.product_type = "digital".to_string();

        let breakdown = calculate_tax(
            &[item("item-1", "100"), digital],
            Decimal::ZERO,
            &Address::country("US"),
            &zones,
        );

        assert_eq!(breakdown.lines[0].tax_amount, Decimal::ZERO);
        assert_eq!(breakdown.lines[0].tax_type, "none");
        assert_eq!(breakdown.lines[1].tax_amount, dec("2.00"));
    }

    #[test]
    fn test_referential_transparency() {
        let z = zone("US", &["US"], &["NY"], 5);
        let zones = vec![(
            z.clone(),
            vec![
                rate(&z, "8.875", TaxAppliesTo::All, false),
                rate(&z, "0.375", TaxAppliesTo::All, true),
            ],
        )];
        let items = [item("item-1", "19.99"), item("item-2", "149.50")];
        let address = Address::new("US", Some("NY"), Some("10001"));

        let first = calculate_tax(&items, dec("9.99"), &address, &zones);
        let second = calculate_tax(&items, dec("9.99"), &address, &zones);
        assert_eq!(first, second);
    }

    #[test]
    fn test_total_is_sum_of_rounded_lines() {
        let z = zone("US", &["US"], &[], 0);
        let zones = vec![(
            z.clone(),
            vec![rate(&z, "8.875", TaxAppliesTo::All, false)],
        )];

        let breakdown = calculate_tax(
            &[item("a", "0.28"), item("b", "0.28")],
            Decimal::ZERO,
            &Address::country("US"),
            &zones,
        );

        // Each line rounds 0.02485 -> 0.02; the total sums the rounded lines
        // (0.04) rather than rounding the raw sum (which would give 0.05).
        assert_eq!(breakdown.lines[0].tax_amount, dec("0.02"));
        assert_eq!(breakdown.total_tax, dec("0.04"));
    }
}

use crate::catalog::extract::{RawAvailability, RawPriceTier};

/// Parse one price string as shown on the storefront ("1,299.90", " 85.50 ").
///
/// Thousands separators are dropped; anything that still fails to parse, or
/// parses to a non-finite value, yields `None`.
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|p| p.is_finite())
}

/// Lowest numeric price across every value of every tier.
pub fn min_price(tiers: &[RawPriceTier]) -> Option<f64> {
    tiers
        .iter()
        .flat_map(|tier| tier.price.iter())
        .filter_map(|raw| parse_price(raw))
        .reduce(f64::min)
}

/// True when any availability entry reports stock.
pub fn any_in_stock(availability: &[RawAvailability]) -> bool {
    availability.iter().any(|a| a.has_stock)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(values: &[&str]) -> RawPriceTier {
        RawPriceTier {
            kind: Some("normalPrice".into()),
            price: values.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn picks_numeric_minimum_across_tiers() {
        let tiers = vec![tier(&["100.00"]), tier(&["85.50"])];
        assert_eq!(min_price(&tiers), Some(85.50));
    }

    #[test]
    fn comparison_is_numeric_not_lexical() {
        // "9.99" > "10.00" lexically
        let tiers = vec![tier(&["10.00", "9.99"])];
        assert_eq!(min_price(&tiers), Some(9.99));
    }

    #[test]
    fn thousands_separators_are_ignored() {
        assert_eq!(parse_price("1,299.90"), Some(1299.90));
        assert_eq!(min_price(&[tier(&["1,299.90", "999"])]), Some(999.0));
    }

    #[test]
    fn unparseable_tiers_are_skipped() {
        assert_eq!(min_price(&[tier(&["", "n/a", "42"])]), Some(42.0));
        assert_eq!(min_price(&[tier(&["n/a"])]), None);
        assert_eq!(min_price(&[]), None);
        assert_eq!(parse_price("inf"), None);
    }

    #[test]
    fn stock_is_true_if_any_entry_has_stock() {
        let entries = vec![
            RawAvailability { has_stock: false },
            RawAvailability { has_stock: true },
        ];
        assert!(any_in_stock(&entries));
        assert!(!any_in_stock(&entries[..1]));
        assert!(!any_in_stock(&[]));
    }
}

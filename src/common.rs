/// Common types and utilities shared across handlers and services
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Display scale of every stored amount and quantity.
pub const DECIMAL_SCALE: u32 = 2;

/// Largest value a `Numeric(8,2)` column holds: 999999.99.
pub const MAX_DECIMAL: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, DECIMAL_SCALE);

/// Canonical decimal form: rounded half away from zero to two places and
/// carried with exactly two fractional digits.
pub fn format_decimal(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(DECIMAL_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(DECIMAL_SCALE);
    rounded
}

/// Sort direction accepted by list endpoints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl From<SortOrder> for sea_orm::Order {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => sea_orm::Order::Asc,
            SortOrder::Desc => sea_orm::Order::Desc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(55.5), "55.50")]
    #[case(dec!(30), "30.00")]
    #[case(dec!(0), "0.00")]
    #[case(dec!(1.005), "1.01")]
    #[case(dec!(-1.005), "-1.01")]
    #[case(dec!(12.344), "12.34")]
    fn canonical_form_has_two_places(#[case] input: Decimal, #[case] expected: &str) {
        assert_eq!(format_decimal(input).to_string(), expected);
    }

    #[test]
    fn largest_storable_amount() {
        assert_eq!(MAX_DECIMAL, dec!(999999.99));
        assert_eq!(MAX_DECIMAL.to_string(), "999999.99");
    }

    #[test]
    fn sort_order_maps_to_query_order() {
        assert!(matches!(sea_orm::Order::from(SortOrder::Asc), sea_orm::Order::Asc));
        assert!(matches!(sea_orm::Order::from(SortOrder::default()), sea_orm::Order::Desc));
    }
}

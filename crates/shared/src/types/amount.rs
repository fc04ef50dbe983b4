//! Numeric policy for amounts and quantities.
//!
//! CRITICAL: Never use floating-point for money or quantities.
//! - Every amount is a `rust_decimal::Decimal`
//! - Values are carried at 6 fractional digits (banker's rounding)
//! - Comparisons tolerate a difference strictly below `EPSILON`

use rust_decimal::{Decimal, RoundingStrategy};

/// Fractional digits carried by every amount and quantity.
pub const AMOUNT_SCALE: u32 = 6;

/// Comparison tolerance: one unit of the last carried digit (1e-6).
pub const EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, AMOUNT_SCALE);

/// Rounds a value to `AMOUNT_SCALE` digits using banker's rounding.
#[must_use]
pub fn normalize(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Returns true if `a` and `b` differ by less than `EPSILON`.
#[must_use]
pub fn approx_eq(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() < EPSILON
}

/// Multiplies a quantity by a unit cost and normalises the result.
#[must_use]
pub fn extend(quantity: Decimal, unit_cost: Decimal) -> Decimal {
    normalize(quantity * unit_cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[test]
    fn test_epsilon_value() {
        assert_eq!(EPSILON, dec!(0.000001));
    }

    #[rstest]
    #[case(dec!(1.0000004), dec!(1.000000))]
    #[case(dec!(1.0000005), dec!(1.000000))]
    #[case(dec!(1.0000015), dec!(1.000002))]
    #[case(dec!(-2.1234567), dec!(-2.123457))]
    fn test_normalize_rounds_half_to_even(#[case] input: Decimal, #[case] expected: Decimal) {
        assert_eq!(normalize(input), expected);
    }

    #[rstest]
    #[case(dec!(100), dec!(100), true)]
    #[case(dec!(100), dec!(100.0000009), true)]
    #[case(dec!(100), dec!(100.000001), false)]
    #[case(dec!(100), dec!(90), false)]
    fn test_approx_eq(#[case] a: Decimal, #[case] b: Decimal, #[case] expected: bool) {
        assert_eq!(approx_eq(a, b), expected);
        assert_eq!(approx_eq(b, a), expected);
    }

    #[test]
    fn test_extend_quantity_by_cost() {
        assert_eq!(extend(dec!(10), dec!(2.5)), dec!(25));
        assert_eq!(extend(dec!(3), dec!(0.3333333)), dec!(1.000000));
    }
}

//! Order size scaling.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Scale a leader order's size by a follower's percent, rounded to three
/// decimal places (banker's rounding, matching `Decimal::round_dp`).
///
/// A zero result means the order is too small to mirror at this scale; the
/// caller skips it rather than placing a zero-size order.
pub fn scale_size(size: Decimal, scale_percent: Decimal) -> Decimal {
    (size * scale_percent / dec!(100)).round_dp(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halves_at_fifty_percent() {
        assert_eq!(scale_size(dec!(100), dec!(50)), dec!(50.0));
    }

    #[test]
    fn rounds_to_three_decimals() {
        assert_eq!(scale_size(dec!(33.333), dec!(10)), dec!(3.333));
        assert_eq!(scale_size(dec!(0.0001), dec!(50)), dec!(0.000));
    }

    #[test]
    fn midpoints_round_half_even() {
        // 0.0025 * 100% = 0.0025 -> banker's rounding to 3 dp gives 0.002.
        assert_eq!(scale_size(dec!(0.0025), dec!(100)), dec!(0.002));
        // 0.0035 -> 0.004.
        assert_eq!(scale_size(dec!(0.0035), dec!(100)), dec!(0.004));
    }

    #[test]
    fn scaling_above_one_hundred_percent_grows_the_order() {
        assert_eq!(scale_size(dec!(2), dec!(250)), dec!(5));
    }

    #[test]
    fn tiny_orders_scale_to_zero() {
        let scaled = scale_size(dec!(0.001), dec!(10));
        assert_eq!(scaled, Decimal::ZERO);
    }
}

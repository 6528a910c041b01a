//! Transaction fee schedule.
//!
//! Every trade is charged five components on its gross notional
//! (price x quantity): a transaction levy, a trading fee, an investor
//! compensation levy, a stamp duty and a fixed trading tariff.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// 0.005%
pub const TRANSACTION_LEVY_RATE: Decimal = dec!(0.00005);
/// 0.005%
pub const TRADING_FEE_RATE: Decimal = dec!(0.00005);
/// 0.002%
pub const INVESTOR_COMPENSATION_LEVY_RATE: Decimal = dec!(0.00002);
/// 0.1%, rounded up to the next whole currency unit.
pub const STAMP_DUTY_RATE: Decimal = dec!(0.001);
/// Flat charge per trade regardless of size.
pub const TRADING_TARIFF: Decimal = dec!(0.50);

/// Scale every fee total is reported at.
pub const FEE_SCALE: u32 = 4;

/// Total fees for a trade with the given gross notional.
///
/// The stamp duty is rounded up to a whole unit on its own; the sum of all
/// components is then rounded half-up to four decimal places. The result
/// always carries exactly four decimal places.
pub fn calculate_fees(notional: Decimal) -> Decimal {
    let transaction_levy = notional * TRANSACTION_LEVY_RATE;
    let trading_fee = notional * TRADING_FEE_RATE;
    let investor_compensation_levy = notional * INVESTOR_COMPENSATION_LEVY_RATE;
    let stamp_duty =
        (notional * STAMP_DUTY_RATE).round_dp_with_strategy(0, RoundingStrategy::AwayFromZero);

    let mut total = (transaction_levy
        + trading_fee
        + investor_compensation_levy
        + stamp_duty
        + TRADING_TARIFF)
        .round_dp_with_strategy(FEE_SCALE, RoundingStrategy::MidpointAwayFromZero);
    total.rescale(FEE_SCALE);
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fees_for_one_thousand() {
        // 0.05 + 0.05 + 0.02 + 1 + 0.50
        let fees = calculate_fees(dec!(1000.00));
        assert_eq!(fees, dec!(1.62));
        assert_eq!(fees.to_string(), "1.6200");
    }

    #[test]
    fn fees_for_twelve_hundred() {
        // 0.144 + ceil(1.2) + 0.5
        assert_eq!(calculate_fees(dec!(1200)), dec!(2.6440));
    }

    #[test]
    fn zero_notional_pays_only_the_tariff() {
        let fees = calculate_fees(Decimal::ZERO);
        assert_eq!(fees, dec!(0.5));
        assert_eq!(fees.scale(), 4);
    }

    #[test]
    fn stamp_duty_rounds_up_not_half_up() {
        // 0.1% of 1001 = 1.001 -> 2, not 1
        let fees = calculate_fees(dec!(1001));
        let expected = dec!(1001) * dec!(0.00012) + dec!(2) + dec!(0.5);
        assert_eq!(fees, expected.round_dp(4));
    }

    #[test]
    fn tiny_notional_still_charges_one_unit_of_stamp_duty() {
        // 0.1% of 0.01 is 0.00001, rounded up to 1
        assert_eq!(calculate_fees(dec!(0.01)), dec!(1.5000));
    }

    #[test]
    fn total_rounds_half_up_at_four_places() {
        // 12.5 * 0.00012 = 0.0015; 0.0015 + 1 + 0.5 = 1.5015
        assert_eq!(calculate_fees(dec!(12.5)), dec!(1.5015));
        // 0.41 * 0.00012 = 0.0000492 -> rounds to 0.0000
        assert_eq!(calculate_fees(dec!(0.41)), dec!(1.5000));
        // 4.5 * 0.00012 = 0.00054 -> 0.0005
        assert_eq!(calculate_fees(dec!(4.5)), dec!(1.5005));
    }

    proptest! {
        #[test]
        fn tariff_is_a_floor_and_scale_is_four(cents in 0u64..100_000_000_000u64) {
            let notional = Decimal::new(cents as i64, 2);
            let fees = calculate_fees(notional);
            prop_assert!(fees >= dec!(0.5));
            prop_assert_eq!(fees.scale(), 4);
        }

        #[test]
        fn fees_never_decrease_with_notional(a in 0u64..10_000_000u64, b in 0u64..10_000_000u64) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let lo = calculate_fees(Decimal::new(lo as i64, 2));
            let hi = calculate_fees(Decimal::new(hi as i64, 2));
            prop_assert!(lo <= hi);
        }
    }
}

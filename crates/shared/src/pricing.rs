//! Order price arithmetic. All amounts are integer cents.

/// Default list price of an order (299,00 EUR)
pub const DEFAULT_BASE_PRICE_CENTS: i64 = 29_900;

/// Discount granted when a referral code cannot be honoured (25,00 EUR)
pub const DEFAULT_REFERRAL_DISCOUNT_CENTS: i64 = 2_500;

/// Final price after referral and custom discounts, never below zero.
pub fn compute_final(base_cents: i64, discount_cents: i64, custom_discount_cents: i64) -> i64 {
    base_cents
        .saturating_sub(discount_cents)
        .saturating_sub(custom_discount_cents)
        .max(0)
}

/// Amount to charge for an order.
///
/// Uses the stored total when it is positive, otherwise recomputes from the
/// configured base price and the order's referral discount.
pub fn charge_amount(total_cents: Option<i64>, base_cents: i64, discount_cents: i64) -> i64 {
    match total_cents {
        Some(total) if total > 0 => total,
        _ => compute_final(base_cents, discount_cents, 0),
    }
}

/// Pricing knobs read from configuration
#[derive(Debug, Clone, Copy)]
pub struct PricingConfig {
    pub base_price_cents: i64,
    pub default_referral_discount_cents: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_price_cents: DEFAULT_BASE_PRICE_CENTS,
            default_referral_discount_cents: DEFAULT_REFERRAL_DISCOUNT_CENTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_final_default_referral() {
        assert_eq!(
            compute_final(DEFAULT_BASE_PRICE_CENTS, DEFAULT_REFERRAL_DISCOUNT_CENTS, 0),
            27_400
        );
    }

    #[test]
    fn test_compute_final_with_custom_discount() {
        assert_eq!(compute_final(29_900, 2_500, 5_000), 22_400);
    }

    #[test]
    fn test_compute_final_never_negative() {
        assert_eq!(compute_final(29_900, 20_000, 20_000), 0);
        assert_eq!(compute_final(0, 1, 0), 0);
        assert_eq!(compute_final(i64::MIN, i64::MAX, i64::MAX), 0);
    }

    #[test]
    fn test_compute_final_matches_formula() {
        for base in [0_i64, 100, 29_900, 50_000] {
            for discount in [0_i64, 50, 2_500, 60_000] {
                for custom in [0_i64, 1, 9_999] {
                    let expected = (base - discount - custom).max(0);
                    assert_eq!(compute_final(base, discount, custom), expected);
                }
            }
        }
    }

    #[test]
    fn test_charge_amount_prefers_stored_total() {
        assert_eq!(charge_amount(Some(27_400), 29_900, 0), 27_400);
    }

    #[test]
    fn test_charge_amount_recomputes_when_total_missing() {
        assert_eq!(charge_amount(None, 29_900, 2_500), 27_400);
        assert_eq!(charge_amount(Some(0), 29_900, 2_500), 27_400);
        assert_eq!(charge_amount(Some(-5), 1_000, 2_000), 0);
    }
}

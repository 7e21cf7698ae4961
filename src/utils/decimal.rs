//! Decimal arithmetic utilities for allocation math.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Safe division that returns zero if divisor is zero.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator == Decimal::ZERO {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

/// `amount * numerator / denominator`, zero when `denominator` is zero.
///
/// Multiplies first for exactness. When the product does not fit, divides
/// first instead; with `numerator <= denominator` that cannot overflow.
pub fn mul_div(amount: Decimal, numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator == Decimal::ZERO {
        return Decimal::ZERO;
    }
    match amount.checked_mul(numerator) {
        Some(product) => product / denominator,
        None => amount * (numerator / denominator),
    }
}

/// `percent`% of `amount` (e.g. `percent_of(1000, 10) == 100`).
pub fn percent_of(amount: Decimal, percent: Decimal) -> Decimal {
    mul_div(amount, percent, dec!(100))
}

/// Share of `part` in `whole` as a percentage, zero when `whole` is zero.
pub fn share_percent(part: Decimal, whole: Decimal) -> Decimal {
    match part.checked_mul(dec!(100)) {
        Some(scaled) => safe_div(scaled, whole),
        None => safe_div(part, whole) * dec!(100),
    }
}

/// Clamp a value into `[lo, hi]`.
pub fn clamp(value: Decimal, lo: Decimal, hi: Decimal) -> Decimal {
    value.max(lo).min(hi)
}

/// Round to cents for display.
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp(2)
}

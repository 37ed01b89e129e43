//! Currency rounding and display helpers.
//!
//! All arithmetic inside the engine runs on full-precision [`Decimal`]s.
//! Rounding to cents happens once, when a value leaves the engine.

use rust_decimal::prelude::*;

/// Round to cents, half away from zero ("round half up" for the
/// non-negative amounts the engine produces).
pub fn round_currency(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Format a dollar amount as `$1,234.56`.
pub fn format_usd(value: Decimal) -> String {
    let rounded = round_currency(value);
    let text = rounded.abs().to_string();
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}${}.{}", sign, grouped, cents)
}

/// Format a decimal rate (0.0725) as a percentage (`7.25%`).
pub fn format_rate(rate: Decimal) -> String {
    format!("{}%", (rate * Decimal::ONE_HUNDRED).normalize())
}

//! Euro amounts.
//!
//! Prices are carried as [`Decimal`] in euros with two decimal places. The
//! payment processor works in minor units (cents) and receives them straight
//! from the browser.

use rust_decimal::{Decimal, RoundingStrategy};

/// ISO 4217 code sent to the payment processor.
pub const CURRENCY: &str = "eur";

/// Smallest charge the payment processor accepts, in cents.
pub const MINIMUM_CHARGE_CENTS: i64 = 50;

/// Round an amount to cents, half away from zero.
#[must_use]
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount the way French receipts do: `"1 234,50 €"`.
#[must_use]
pub fn format_eur(amount: Decimal) -> String {
    let rounded = round_cents(amount);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (units, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, digit) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(digit);
    }

    format!("{}{grouped},{cents} €", if negative { "-" } else { "" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_cents_half_away_from_zero() {
        assert_eq!(round_cents(Decimal::new(10_005, 3)), Decimal::new(1001, 2));
        assert_eq!(round_cents(Decimal::new(10_004, 3)), Decimal::new(1000, 2));
    }

    #[test]
    fn test_format_eur() {
        assert_eq!(format_eur(Decimal::new(999, 2)), "9,99 €");
        assert_eq!(format_eur(Decimal::new(12345, 1)), "1 234,50 €");
        assert_eq!(format_eur(Decimal::ZERO), "0,00 €");
    }
}

//! Monetary helpers using decimal arithmetic.
//!
//! Amounts are plain [`Decimal`] values. The currency is a display label only:
//! nothing in the system converts between currencies.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::Quantity;

/// Fractional digits kept when rounding a percentage discount.
pub const DISCOUNT_SCALE: u32 = 4;

/// Round half-up (away from zero on a tie) to `dp` fractional digits.
#[must_use]
pub fn round_half_up(amount: Decimal, dp: u32) -> Decimal {
    amount.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Total for `quantity` units at `unit_price`.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: Quantity) -> Decimal {
    unit_price * Decimal::from(quantity.get())
}

/// ISO 4217 currency codes used as display labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    EUR,
    USD,
    GBP,
    CAD,
    XOF,
}

impl CurrencyCode {
    /// The three-letter code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::EUR => "EUR",
            Self::USD => "USD",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::XOF => "XOF",
        }
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EUR" => Ok(Self::EUR),
            "USD" => Ok(Self::USD),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "XOF" => Ok(Self::XOF),
            _ => Err(format!("unsupported currency code: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_round_half_up_on_tie() {
        assert_eq!(round_half_up(dec!(1.00005), 4), dec!(1.0001));
        assert_eq!(round_half_up(dec!(1.00004), 4), dec!(1.0000));
    }

    #[test]
    fn test_line_total() {
        let qty = Quantity::new(3).unwrap_or(Quantity::ONE);
        assert_eq!(line_total(dec!(10.00), qty), dec!(30.00));
    }

    #[test]
    fn test_currency_code_parse_is_case_insensitive() {
        assert_eq!("eur".parse::<CurrencyCode>(), Ok(CurrencyCode::EUR));
        assert!("ZZZ".parse::<CurrencyCode>().is_err());
    }
}

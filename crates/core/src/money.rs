use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

/// Signed amount as it appears on a statement line. Sign meaning is per
/// source; see `SignConvention` in the engine config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::from(cents) / Decimal::from(100))
    }

    pub fn to_cents(self) -> i64 {
        (self.0 * Decimal::from(100)).round().to_i64().unwrap_or(0)
    }

    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(decimal.round_dp(2))
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn is_positive(self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    pub fn abs(self) -> Self {
        Money(self.0.abs())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "-${:.2}", self.0.abs())
        } else {
            write!(f, "${:.2}", self.0)
        }
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    /// Accepts statement-style text: `1,234.50`, `$12.00`, `-8.1`, `(45.00)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negated, body) = match trimmed.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
            Some(inner) => (true, inner),
            None => (false, trimmed),
        };
        let cleaned: String = body.chars().filter(|c| *c != '$' && *c != ',').collect();
        let value = Decimal::from_str(cleaned.trim())?;
        Ok(Money::from_decimal(if negated { -value } else { value }))
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Self;
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |a, b| a + b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_round_trip_through_decimal() {
        let m = Money::from_cents(-50_000);
        assert_eq!(m.to_cents(), -50_000);
        assert!(m.is_negative());
        assert_eq!(m.abs(), Money::from_cents(50_000));
    }

    #[test]
    fn zero_is_neither_sign() {
        assert!(!Money::zero().is_negative());
        assert!(!Money::zero().is_positive());
    }

    #[test]
    fn display_includes_sign() {
        assert_eq!(Money::from_cents(1234).to_string(), "$12.34");
        assert_eq!(Money::from_cents(-1234).to_string(), "-$12.34");
    }

    #[test]
    fn parses_statement_text() {
        assert_eq!("1,234.50".parse::<Money>().unwrap(), Money::from_cents(123_450));
        assert_eq!("$12".parse::<Money>().unwrap(), Money::from_cents(1200));
        assert_eq!("(45.00)".parse::<Money>().unwrap(), Money::from_cents(-4500));
        assert!("abc".parse::<Money>().is_err());
    }

    #[test]
    fn sums() {
        let total: Money = [100, 250, -50].iter().map(|c| Money::from_cents(*c)).sum();
        assert_eq!(total, Money::from_cents(300));
    }
}

//! Money amounts in integer cents.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Money amount represented in cents to avoid floating point issues.
///
/// Serializes as a bare integer so document fields read `"unit_price_cents": 1050`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Highest unit price whose total still fits for any `u32` quantity.
    pub const MAX_UNIT_PRICE: Money = Money(i64::MAX / u32::MAX as i64);

    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Parses an amount written in major units ("10.5", "3", "0.99").
    ///
    /// Fractions of a cent are rounded half-to-even. Returns None for
    /// anything that is not a plain decimal number.
    pub fn parse_major(s: &str) -> Option<Self> {
        let major = Decimal::from_str(s.trim()).ok()?;
        let cents = (major * Decimal::ONE_HUNDRED).round();
        cents.to_i64().map(Self)
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by a quantity, failing with `InvalidInput` on overflow.
    pub fn multiply(&self, quantity: u32) -> Result<Money> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Money)
            .ok_or_else(|| out_of_range(format!("{self} x {quantity}")))
    }

    /// Adds two amounts, failing with `InvalidInput` on overflow.
    pub fn checked_add(self, rhs: Money) -> Result<Money> {
        self.0
            .checked_add(rhs.0)
            .map(Money)
            .ok_or_else(|| out_of_range(format!("{self} + {rhs}")))
    }

    /// Sums amounts, failing with `InvalidInput` on overflow.
    pub fn try_sum(amounts: impl IntoIterator<Item = Money>) -> Result<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }

    /// Rejects negative prices and prices above [`Money::MAX_UNIT_PRICE`].
    pub fn validate_unit_price(self) -> Result<Money> {
        if self.is_negative() {
            return Err(LedgerError::InvalidInput(format!(
                "unit price {self} must not be negative"
            )));
        }
        if self > Self::MAX_UNIT_PRICE {
            return Err(LedgerError::InvalidInput(format!(
                "unit price {self} exceeds {}",
                Self::MAX_UNIT_PRICE
            )));
        }
        Ok(self)
    }
}

fn out_of_range(expr: String) -> LedgerError {
    LedgerError::InvalidInput(format!("amount out of range: {expr}"))
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

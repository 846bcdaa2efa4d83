//! Amount type
//!
//! Domain primitives for custody amounts with business rule validation.
//! All amounts are validated at construction time, ensuring invalid values
//! cannot exist in the ledger.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum decimal places (18, the smallest on-chain denomination)
const MAX_SCALE: u32 = 18;

/// Amount represents a validated value moving through the ledger.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - Maximum 18 decimal places
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use custody_ledger::domain::Amount;
///
/// let amount = Amount::new(Decimal::new(19, 1)).unwrap();
/// assert_eq!(amount.value(), Decimal::new(19, 1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

/// Errors that can occur when creating an Amount or Balance
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount must be positive (got {0})")]
    NotPositive(Decimal),

    #[error("Balance cannot be negative (got {0})")]
    Negative(Decimal),

    #[error("Amount has too many decimal places (max {MAX_SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

impl Amount {
    /// Create a new Amount with validation.
    ///
    /// # Errors
    /// - `AmountError::NotPositive` if value <= 0
    /// - `AmountError::TooManyDecimals` if more than 18 decimal places
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value <= Decimal::ZERO {
            return Err(AmountError::NotPositive(value));
        }

        if value.scale() > MAX_SCALE {
            return Err(AmountError::TooManyDecimals(value.scale()));
        }

        Ok(Self(value))
    }

    /// Create an Amount from an integer (no decimal places).
    pub fn from_integer(value: i64) -> Result<Self, AmountError> {
        Self::new(Decimal::from(value))
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s).map_err(|e| AmountError::ParseError(e.to_string()))?;
        Amount::new(decimal)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Balance represents a merchant balance or a custody bucket.
/// Unlike Amount, Balance can be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Balance(Decimal);

impl Balance {
    /// Create a new balance (zero or positive)
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value < Decimal::ZERO {
            return Err(AmountError::Negative(value));
        }

        Ok(Self(value))
    }

    /// Create a zero balance
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Get the underlying value
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Check if balance covers the given amount
    pub fn is_sufficient_for(&self, amount: &Amount) -> bool {
        self.0 >= amount.value()
    }

    /// Add amount to balance. Fails only past the range of `Decimal`.
    pub fn credit(&self, amount: &Amount) -> Result<Balance, AmountError> {
        let value = self
            .0
            .checked_add(amount.value())
            .ok_or(AmountError::Overflow)?;
        Balance::new(value)
    }

    /// Subtract amount from balance
    pub fn debit(&self, amount: &Amount) -> Result<Balance, AmountError> {
        let value = self
            .0
            .checked_sub(amount.value())
            .ok_or(AmountError::Overflow)?;
        Balance::new(value)
    }

    /// Subtract, flooring the result at zero
    pub fn saturating_debit(&self, value: Decimal) -> Balance {
        if value >= self.0 {
            Balance::zero()
        } else {
            Self(self.0 - value)
        }
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::zero()
    }
}

impl TryFrom<Decimal> for Balance {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Balance::new(value)
    }
}

impl From<Balance> for Decimal {
    fn from(balance: Balance) -> Self {
        balance.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_positive() {
        let amount = Amount::new(dec!(2.0));
        assert_eq!(amount.unwrap().value(), dec!(2.0));
    }

    #[test]
    fn test_amount_zero_rejected() {
        let amount = Amount::new(Decimal::ZERO);
        assert!(matches!(amount, Err(AmountError::NotPositive(_))));
    }

    #[test]
    fn test_amount_negative_rejected() {
        let amount = Amount::new(dec!(-1));
        assert!(matches!(amount, Err(AmountError::NotPositive(_))));
    }

    #[test]
    fn test_amount_wei_precision_ok() {
        // one wei
        let amount = Amount::new(Decimal::new(1, 18));
        assert!(amount.is_ok());
    }

    #[test]
    fn test_amount_too_many_decimals() {
        let amount = Amount::new(Decimal::new(1, 19));
        assert!(matches!(amount, Err(AmountError::TooManyDecimals(19))));
    }

    #[test]
    fn test_amount_has_no_value_cap() {
        let amount = Amount::new(dec!(5000000000000));
        assert_eq!(amount.unwrap().value(), dec!(5000000000000));
    }

    #[test]
    fn test_amount_from_str() {
        let amount: Amount = "1.9".parse().unwrap();
        assert_eq!(amount.value(), dec!(1.9));

        let bad: Result<Amount, _> = "abc".parse();
        assert!(matches!(bad, Err(AmountError::ParseError(_))));
    }

    #[test]
    fn test_amount_serde_as_decimal() {
        let amount: Amount = serde_json::from_str("\"2.5\"").unwrap();
        assert_eq!(amount.value(), dec!(2.5));

        let rejected: Result<Amount, _> = serde_json::from_str("\"0\"");
        assert!(rejected.is_err());
    }

    #[test]
    fn test_balance_credit_debit() {
        let balance = Balance::zero();
        let amount = Amount::new(dec!(2.0)).unwrap();

        let balance = balance.credit(&amount).unwrap();
        assert_eq!(balance.value(), dec!(2.0));

        let withdraw = Amount::new(dec!(0.5)).unwrap();
        let balance = balance.debit(&withdraw).unwrap();
        assert_eq!(balance.value(), dec!(1.5));
    }

    #[test]
    fn test_balance_insufficient() {
        let balance = Balance::new(dec!(1)).unwrap();
        let amount = Amount::new(dec!(2)).unwrap();

        assert!(!balance.is_sufficient_for(&amount));
        assert!(matches!(balance.debit(&amount), Err(AmountError::Negative(_))));
    }

    #[test]
    fn test_balance_credit_past_trillion() {
        let balance = Balance::new(dec!(600000000000)).unwrap();
        let amount = Amount::new(dec!(600000000000)).unwrap();
        assert_eq!(balance.credit(&amount).unwrap().value(), dec!(1200000000000));
    }

    #[test]
    fn test_balance_credit_overflow() {
        let balance = Balance::new(Decimal::MAX).unwrap();
        let amount = Amount::new(Decimal::ONE).unwrap();
        assert_eq!(balance.credit(&amount), Err(AmountError::Overflow));
    }

    #[test]
    fn test_balance_saturating_debit_floors_at_zero() {
        let balance = Balance::new(dec!(1.9)).unwrap();
        assert_eq!(balance.saturating_debit(dec!(0.4)).value(), dec!(1.5));
        assert!(balance.saturating_debit(dec!(5)).is_zero());
    }
}

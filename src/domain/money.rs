use crate::error::PaymentError;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of decimal places carried by every monetary quantity.
pub const MONEY_SCALE: u32 = 4;
/// Number of decimal places carried by exchange rates.
pub const RATE_SCALE: u32 = 10;
/// Largest amount or balance the ledger stores: 16 integer digits, 4 decimals.
pub const MAX_MONEY: Decimal = dec!(9999999999999999.9999);

/// Rounds half-up (midpoint away from zero) and pins the result to `scale`.
pub fn round_half_up(value: Decimal, scale: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(scale);
    rounded
}

/// Represents a monetary value with 4 decimal places precision.
///
/// Every constructor rounds, so a `Money` never carries more than
/// [`MONEY_SCALE`] places and always renders with exactly that many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::from_parts(0, 0, 0, false, MONEY_SCALE));

    pub fn new(value: Decimal) -> Self {
        Self(round_half_up(value, MONEY_SCALE))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Sum of two values, or `InvalidAmount` if it leaves the storable range.
    pub fn checked_add(self, rhs: Money) -> Result<Money, PaymentError> {
        Self::bounded(self.0.checked_add(rhs.0))
            .ok_or_else(|| out_of_range(format!("{self} + {rhs}")))
    }

    /// Difference of two values, or `InvalidAmount` if it leaves the
    /// storable range.
    pub fn checked_sub(self, rhs: Money) -> Result<Money, PaymentError> {
        Self::bounded(self.0.checked_sub(rhs.0))
            .ok_or_else(|| out_of_range(format!("{self} - {rhs}")))
    }

    fn bounded(value: Option<Decimal>) -> Option<Money> {
        value
            .map(Money::new)
            .filter(|money| money.0.abs() <= MAX_MONEY)
    }
}

fn out_of_range(expression: String) -> PaymentError {
    PaymentError::InvalidAmount(format!("{expression} exceeds the maximum of {MAX_MONEY}"))
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A strictly positive monetary amount, used as the operand of every ledger
/// mutation.
///
/// At most [`MONEY_SCALE`] decimal places and at most [`MAX_MONEY`]; anything
/// else is rejected rather than rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Money);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount(format!(
                "amount must be greater than zero, got {value}"
            )));
        }
        if value.normalize().scale() > MONEY_SCALE {
            return Err(PaymentError::InvalidAmount(format!(
                "amount must have at most {MONEY_SCALE} decimal places, got {value}"
            )));
        }
        if value > MAX_MONEY {
            return Err(out_of_range(value.to_string()));
        }
        Ok(Self(Money::new(value)))
    }

    pub fn money(&self) -> Money {
        self.0
    }

    pub fn value(&self) -> Decimal {
        self.0.value()
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<Money> for Amount {
    type Error = PaymentError;

    fn try_from(value: Money) -> Result<Self, Self::Error> {
        Self::new(value.value())
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

impl From<Amount> for Money {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// ISO-4217 style currency code: three ASCII letters, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencyCode {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_uppercase()))
        } else {
            Err(PaymentError::ValidationError(format!(
                "invalid currency code '{s}'"
            )))
        }
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

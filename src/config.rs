use crate::error::{PaymentError, Result};
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const DEFAULT_QUOTE_VALIDITY_MINUTES: i64 = 5;
pub const DEFAULT_FEE_PERCENTAGE: Decimal = dec!(2.5);
pub const DEFAULT_IDEMPOTENCY_TTL_HOURS: i64 = 24;

/// One year, in minutes.
pub const MAX_QUOTE_VALIDITY_MINUTES: i64 = 60 * 24 * 365;
/// One year, in hours.
pub const MAX_IDEMPOTENCY_TTL_HOURS: i64 = 24 * 365;

/// Tunables shared by the quote engine and the idempotency gate.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub quote_validity_minutes: i64,
    /// Flat fee charged on top of the send amount, in percent.
    pub fee_percentage: Decimal,
    pub idempotency_ttl_hours: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quote_validity_minutes: DEFAULT_QUOTE_VALIDITY_MINUTES,
            fee_percentage: DEFAULT_FEE_PERCENTAGE,
            idempotency_ttl_hours: DEFAULT_IDEMPOTENCY_TTL_HOURS,
        }
    }
}

impl EngineConfig {
    /// Checks every setting at once, so a bad config fails at startup rather
    /// than on the first quote or idempotent request.
    pub fn validate(&self) -> Result<()> {
        self.quote_validity()?;
        self.idempotency_ttl()?;
        self.checked_fee_percentage()?;
        Ok(())
    }

    /// Between one minute and [`MAX_QUOTE_VALIDITY_MINUTES`].
    pub fn quote_validity(&self) -> Result<Duration> {
        bounded_duration(
            "quote validity in minutes",
            self.quote_validity_minutes,
            MAX_QUOTE_VALIDITY_MINUTES,
            Duration::try_minutes,
        )
    }

    /// Between one hour and [`MAX_IDEMPOTENCY_TTL_HOURS`].
    pub fn idempotency_ttl(&self) -> Result<Duration> {
        bounded_duration(
            "idempotency expiry in hours",
            self.idempotency_ttl_hours,
            MAX_IDEMPOTENCY_TTL_HOURS,
            Duration::try_hours,
        )
    }

    pub fn checked_fee_percentage(&self) -> Result<Decimal> {
        if self.fee_percentage < Decimal::ZERO || self.fee_percentage > Decimal::ONE_HUNDRED {
            return Err(PaymentError::ValidationError(format!(
                "fee percentage must be between 0 and 100, got {}",
                self.fee_percentage
            )));
        }
        Ok(self.fee_percentage)
    }
}

fn bounded_duration(
    what: &str,
    value: i64,
    max: i64,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Duration> {
    if !(1..=max).contains(&value) {
        return Err(PaymentError::ValidationError(format!(
            "{what} must be between 1 and {max}, got {value}"
        )));
    }
    unit(value)
        .ok_or_else(|| PaymentError::ValidationError(format!("{what} of {value} is out of range")))
}

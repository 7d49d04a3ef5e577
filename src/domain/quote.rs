use super::money::{Amount, CurrencyCode, MAX_MONEY, Money, RATE_SCALE, round_half_up};
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuoteStatus {
    Active,
    Used,
    Expired,
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QuoteStatus::Active => "ACTIVE",
            QuoteStatus::Used => "USED",
            QuoteStatus::Expired => "EXPIRED",
        };
        f.write_str(label)
    }
}

/// Amounts derived from a send amount, a rate, and a fee percentage.
///
/// Each quantity is rounded half-up to 4 places on its own; the total is the
/// sum of the already-rounded send and fee amounts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotePricing {
    pub send_amount: Money,
    pub rate: Decimal,
    pub fee_percentage: Decimal,
    pub fee_amount: Money,
    pub total_amount: Money,
    pub receive_amount: Money,
}

impl QuotePricing {
    /// Fails `ValidationError` when the fee, the total or the receive amount
    /// falls outside the storable range.
    pub fn compute(
        send_amount: Amount,
        rate: Decimal,
        fee_percentage: Decimal,
    ) -> Result<Self, PaymentError> {
        let send = send_amount.value();
        let fee_amount = bounded(
            "fee amount",
            send.checked_mul(fee_percentage)
                .and_then(|fee| fee.checked_div(Decimal::ONE_HUNDRED)),
        )?;
        let receive_amount = bounded("receive amount", send.checked_mul(rate))?;
        let total_amount = send_amount
            .money()
            .checked_add(fee_amount)
            .map_err(|err| PaymentError::ValidationError(format!("total amount: {err}")))?;

        Ok(Self {
            send_amount: send_amount.money(),
            rate: round_half_up(rate, RATE_SCALE),
            fee_percentage,
            fee_amount,
            total_amount,
            receive_amount,
        })
    }
}

fn bounded(what: &str, value: Option<Decimal>) -> Result<Money, PaymentError> {
    value
        .filter(|value| value.abs() <= MAX_MONEY)
        .map(Money::new)
        .ok_or_else(|| {
            PaymentError::ValidationError(format!("{what} exceeds the maximum of {MAX_MONEY}"))
        })
}

/// A time-boxed, single-use priced conversion snapshot.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Quote {
    pub id: Uuid,
    pub owner: Uuid,
    pub from_currency: CurrencyCode,
    pub to_currency: CurrencyCode,
    pub send_amount: Money,
    pub rate: Decimal,
    pub fee_percentage: Decimal,
    pub fee_amount: Money,
    pub receive_amount: Money,
    pub total_amount: Money,
    pub status: QuoteStatus,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Quote {
    pub fn new(
        owner: Uuid,
        from_currency: CurrencyCode,
        to_currency: CurrencyCode,
        pricing: QuotePricing,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            from_currency,
            to_currency,
            send_amount: pricing.send_amount,
            rate: pricing.rate,
            fee_percentage: pricing.fee_percentage,
            fee_amount: pricing.fee_amount,
            receive_amount: pricing.receive_amount,
            total_amount: pricing.total_amount,
            status: QuoteStatus::Active,
            expires_at,
            used_at: None,
            created_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

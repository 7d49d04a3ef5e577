//! Data owned by external collaborators: user profiles, exchange rates, and
//! the payment rail's request/response shapes.

use super::money::{CurrencyCode, Money};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct UserProfile {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ExchangeRate {
    pub from_currency: CurrencyCode,
    pub to_currency: CurrencyCode,
    pub rate: Decimal,
    pub inverse_rate: Decimal,
    pub source: String,
    pub active: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl ExchangeRate {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.valid_from <= now
            && self.valid_until.is_none_or(|until| until >= now)
    }
}

/// What the payment rail needs to pay out a remittance.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ProviderRequest {
    pub recipient_email: String,
    pub recipient_name: String,
    pub recipient_phone: Option<String>,
    pub amount: Money,
    pub currency: CurrencyCode,
    pub sender_name: String,
    pub sender_email: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ProviderResponse {
    pub success: bool,
    pub external_id: String,
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn rate(valid_until: Option<DateTime<Utc>>) -> ExchangeRate {
        ExchangeRate {
            from_currency: "CLP".parse().unwrap(),
            to_currency: "PEN".parse().unwrap(),
            rate: dec!(0.0043),
            inverse_rate: dec!(232.55813953),
            source: "manual".into(),
            active: true,
            valid_from: Utc::now() - Duration::hours(1),
            valid_until,
        }
    }

    #[test]
    fn test_rate_validity_window() {
        let now = Utc::now();
        assert!(rate(None).is_valid_at(now));
        assert!(rate(Some(now + Duration::hours(1))).is_valid_at(now));
        assert!(!rate(Some(now - Duration::minutes(1))).is_valid_at(now));

        let mut inactive = rate(None);
        inactive.active = false;
        assert!(!inactive.is_valid_at(now));
    }

    #[test]
    fn test_full_name() {
        let user = UserProfile {
            id: Uuid::new_v4(),
            first_name: "Ana".into(),
            last_name: "".into(),
            email: "ana@example.com".into(),
        };
        assert_eq!(user.full_name(), "Ana");
    }
}

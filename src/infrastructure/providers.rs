//! Stand-ins for the systems the engine does not own: the exchange-rate
//! table, the payout rail and the user directory.

use crate::domain::directory::{ExchangeRate, ProviderRequest, ProviderResponse, UserProfile};
use crate::domain::money::{CurrencyCode, RATE_SCALE, round_half_up};
use crate::domain::ports::{RateProvider, RemittanceProvider, UserDirectory};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use rand::distributions::Alphanumeric;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A fixed set of exchange rates.
#[derive(Debug, Default, Clone)]
pub struct StaticRateTable {
    rates: Vec<ExchangeRate>,
}

impl StaticRateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// CLP/PEN in both directions.
    pub fn with_defaults() -> Result<Self> {
        let clp: CurrencyCode = "CLP".parse()?;
        let pen: CurrencyCode = "PEN".parse()?;
        Ok(Self::new()
            .with_rate(clp.clone(), pen.clone(), dec!(0.0043))
            .with_rate(pen, clp, dec!(232.55813953)))
    }

    /// Adds a manual rate valid from now on with no end date.
    pub fn with_rate(self, from: CurrencyCode, to: CurrencyCode, rate: Decimal) -> Self {
        let inverse_rate = Decimal::ONE
            .checked_div(rate)
            .map(|inverse| round_half_up(inverse, RATE_SCALE))
            .unwrap_or(Decimal::ZERO);
        self.with_exchange_rate(ExchangeRate {
            from_currency: from,
            to_currency: to,
            rate,
            inverse_rate,
            source: "manual".to_string(),
            active: true,
            valid_from: Utc::now(),
            valid_until: None,
        })
    }

    pub fn with_exchange_rate(mut self, rate: ExchangeRate) -> Self {
        self.rates.push(rate);
        self
    }
}

#[async_trait]
impl RateProvider for StaticRateTable {
    /// The valid rate for the pair with the latest `valid_from`.
    async fn get_active_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<ExchangeRate> {
        let now = Utc::now();
        self.rates
            .iter()
            .filter(|rate| {
                &rate.from_currency == from && &rate.to_currency == to && rate.is_valid_at(now)
            })
            .max_by_key(|rate| rate.valid_from)
            .cloned()
            .ok_or_else(|| PaymentError::not_found("ExchangeRate", format!("{from}->{to}")))
    }

    /// Valid rates ordered by currency pair.
    async fn get_all_active_rates(&self) -> Result<Vec<ExchangeRate>> {
        let now = Utc::now();
        let mut rates: Vec<ExchangeRate> = self
            .rates
            .iter()
            .filter(|rate| rate.is_valid_at(now))
            .cloned()
            .collect();
        rates.sort_by(|a, b| {
            (&a.from_currency, &a.to_currency).cmp(&(&b.from_currency, &b.to_currency))
        });
        Ok(rates)
    }
}

/// A payout rail that succeeds with a fixed probability after a random delay.
#[derive(Debug, Clone)]
pub struct SimulatedRemittanceProvider {
    success_rate: f64,
    latency_ms: RangeInclusive<u64>,
}

impl Default for SimulatedRemittanceProvider {
    fn default() -> Self {
        Self::new(0.95, 100..=500)
    }
}

impl SimulatedRemittanceProvider {
    /// `success_rate` is clamped to `[0, 1]`; NaN counts as 0.
    pub fn new(success_rate: f64, latency_ms: RangeInclusive<u64>) -> Self {
        let success_rate = if success_rate.is_nan() {
            0.0
        } else {
            success_rate.clamp(0.0, 1.0)
        };
        Self {
            success_rate,
            latency_ms,
        }
    }
}

fn external_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect();
    format!("EXT-{}-{suffix}", Utc::now().timestamp_millis())
}

#[async_trait]
impl RemittanceProvider for SimulatedRemittanceProvider {
    async fn send_remittance(&self, request: ProviderRequest) -> Result<ProviderResponse> {
        debug!(
            recipient = %request.recipient_email,
            amount = %request.amount,
            currency = %request.currency,
            "sending remittance to provider"
        );

        // The thread-local rng is not Send; draw everything before sleeping.
        let (delay, success) = {
            let mut rng = rand::thread_rng();
            let delay = if self.latency_ms.is_empty() {
                0
            } else {
                rng.gen_range(self.latency_ms.clone())
            };
            (delay, rng.gen_bool(self.success_rate))
        };
        tokio::time::sleep(Duration::from_millis(delay)).await;

        if success {
            let external_id = external_id();
            info!(%external_id, "provider accepted remittance");
            Ok(ProviderResponse {
                success: true,
                external_id,
                status: "completed".to_string(),
                message: "Remittance processed successfully".to_string(),
                timestamp: Utc::now(),
            })
        } else {
            warn!("provider rejected remittance");
            Ok(ProviderResponse {
                success: false,
                external_id: String::new(),
                status: "failed".to_string(),
                message: "External provider error: Service temporarily unavailable".to_string(),
                timestamp: Utc::now(),
            })
        }
    }

    async fn check_status(&self, external_id: &str) -> Result<String> {
        debug!(%external_id, "checking provider status");
        Ok("completed".to_string())
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<Uuid, UserProfile>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a profile.
    pub async fn register(&self, profile: UserProfile) {
        self.users.write().await.insert(profile.id, profile);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_one(&self, user_id: Uuid) -> Result<UserProfile> {
        self.users
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PaymentError::not_found("User", user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Money;
    use chrono::Duration as ChronoDuration;

    fn code(raw: &str) -> CurrencyCode {
        raw.parse().unwrap()
    }

    #[tokio::test]
    async fn test_rate_lookup() {
        let table = StaticRateTable::with_defaults().unwrap();

        let rate = table.get_active_rate(&code("CLP"), &code("PEN")).await.unwrap();
        assert_eq!(rate.rate, dec!(0.0043));
        assert_eq!(rate.inverse_rate, dec!(232.5581395349));

        assert!(matches!(
            table.get_active_rate(&code("CLP"), &code("USD")).await,
            Err(PaymentError::NotFound { .. })
        ));
        let pairs: Vec<String> = table
            .get_all_active_rates()
            .await
            .unwrap()
            .iter()
            .map(|rate| format!("{}{}", rate.from_currency, rate.to_currency))
            .collect();
        assert_eq!(pairs, vec!["CLPPEN", "PENCLP"]);
    }

    #[tokio::test]
    async fn test_newest_valid_rate_wins() {
        let now = Utc::now();
        let base = ExchangeRate {
            from_currency: code("CLP"),
            to_currency: code("PEN"),
            rate: dec!(0.0040),
            inverse_rate: dec!(250),
            source: "manual".into(),
            active: true,
            valid_from: now - ChronoDuration::hours(2),
            valid_until: None,
        };
        let table = StaticRateTable::new()
            .with_exchange_rate(base.clone())
            .with_exchange_rate(ExchangeRate {
                rate: dec!(0.0045),
                valid_from: now - ChronoDuration::hours(1),
                ..base.clone()
            })
            .with_exchange_rate(ExchangeRate {
                rate: dec!(0.0050),
                valid_from: now - ChronoDuration::minutes(30),
                active: false,
                ..base.clone()
            })
            .with_exchange_rate(ExchangeRate {
                rate: dec!(0.0060),
                valid_from: now + ChronoDuration::hours(1),
                ..base
            });

        let rate = table.get_active_rate(&code("CLP"), &code("PEN")).await.unwrap();
        assert_eq!(rate.rate, dec!(0.0045));
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            recipient_email: "r@example.pe".into(),
            recipient_name: "R".into(),
            recipient_phone: None,
            amount: Money::new(dec!(10)),
            currency: code("PEN"),
            sender_name: "S".into(),
            sender_email: "s@example.cl".into(),
        }
    }

    #[tokio::test]
    async fn test_simulated_provider_outcomes() {
        let always = SimulatedRemittanceProvider::new(1.0, 0..=0);
        let response = always.send_remittance(request()).await.unwrap();
        assert!(response.success);
        assert_eq!(response.status, "completed");
        let parts: Vec<&str> = response.external_id.splitn(3, '-').collect();
        assert_eq!(parts[0], "EXT");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));

        let never = SimulatedRemittanceProvider::new(0.0, 0..=0);
        let response = never.send_remittance(request()).await.unwrap();
        assert!(!response.success);
        assert_eq!(response.status, "failed");
        assert!(response.external_id.is_empty());

        assert_eq!(never.check_status("EXT-1").await.unwrap(), "completed");
    }

    #[tokio::test]
    async fn test_user_directory() {
        let directory = InMemoryUserDirectory::new();
        let id = Uuid::new_v4();
        directory
            .register(UserProfile {
                id,
                first_name: "Ana".into(),
                last_name: "Rojas".into(),
                email: "ana@example.cl".into(),
            })
            .await;

        assert_eq!(directory.find_one(id).await.unwrap().full_name(), "Ana Rojas");
        assert!(matches!(
            directory.find_one(Uuid::new_v4()).await,
            Err(PaymentError::NotFound { entity: "User", .. })
        ));
    }
}

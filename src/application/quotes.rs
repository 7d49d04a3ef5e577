use crate::config::EngineConfig;
use crate::domain::money::{Amount, CurrencyCode};
use crate::domain::ports::{QuoteStoreRef, RateProviderRef};
use crate::domain::quote::{Quote, QuotePricing, QuoteStatus};
use crate::error::{PaymentError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_QUOTE_LIMIT: usize = 20;

/// Produces priced, time-boxed, single-use conversion quotes.
pub struct QuoteEngine {
    quotes: QuoteStoreRef,
    rates: RateProviderRef,
    config: EngineConfig,
}

impl QuoteEngine {
    pub fn new(quotes: QuoteStoreRef, rates: RateProviderRef, config: &EngineConfig) -> Self {
        Self {
            quotes,
            rates,
            config: config.clone(),
        }
    }

    pub async fn create(
        &self,
        owner: Uuid,
        from_currency: &CurrencyCode,
        to_currency: &CurrencyCode,
        send_amount: Decimal,
    ) -> Result<Quote> {
        if from_currency == to_currency {
            return Err(PaymentError::ValidationError(
                "source and destination currencies must be different".to_string(),
            ));
        }
        let send_amount = Amount::new(send_amount).map_err(|err| match err {
            PaymentError::InvalidAmount(detail) => {
                PaymentError::ValidationError(format!("send amount: {detail}"))
            }
            other => other,
        })?;
        let validity = self.config.quote_validity()?;
        let fee_percentage = self.config.checked_fee_percentage()?;

        let rate = self.rates.get_active_rate(from_currency, to_currency).await?;
        let pricing = QuotePricing::compute(send_amount, rate.rate, fee_percentage)?;

        let now = Utc::now();
        let expires_at = now.checked_add_signed(validity).ok_or_else(|| {
            PaymentError::ValidationError(format!("quote expiry {now} + {validity} is out of range"))
        })?;
        let quote = Quote::new(
            owner,
            from_currency.clone(),
            to_currency.clone(),
            pricing,
            now,
            expires_at,
        );
        self.quotes.insert(quote.clone()).await?;

        info!(
            quote_id = %quote.id,
            %owner,
            pair = %format!("{from_currency}->{to_currency}"),
            send = %quote.send_amount,
            total = %quote.total_amount,
            receive = %quote.receive_amount,
            expires_at = %quote.expires_at,
            "quote created"
        );
        Ok(quote)
    }

    pub async fn find_one(&self, quote_id: Uuid) -> Result<Quote> {
        self.quotes
            .get(quote_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("Quote", quote_id))
    }

    /// Returns the quote only while it is ACTIVE and unexpired.
    ///
    /// An ACTIVE quote found past its expiry is flipped to EXPIRED before the
    /// call fails; concurrent readers may all attempt the flip.
    pub async fn find_active_quote(&self, quote_id: Uuid) -> Result<Quote> {
        let quote = self.find_one(quote_id).await?;

        if quote.status != QuoteStatus::Active {
            return Err(PaymentError::InvalidState(format!(
                "quote {quote_id} is not active (status: {})",
                quote.status
            )));
        }

        if quote.is_expired_at(Utc::now()) {
            self.quotes.mark_expired(quote_id).await?;
            warn!(%quote_id, expires_at = %quote.expires_at, "quote expired on access");
            return Err(PaymentError::Expired(quote_id));
        }

        Ok(quote)
    }

    /// Consumes an ACTIVE quote. Fails `InvalidState` if another caller
    /// consumed or expired it first.
    pub async fn mark_as_used(&self, quote_id: Uuid) -> Result<Quote> {
        let quote = self.quotes.mark_used(quote_id, Utc::now()).await?;
        info!(%quote_id, "quote consumed");
        Ok(quote)
    }

    pub async fn find_by_owner(&self, owner: Uuid, limit: usize) -> Result<Vec<Quote>> {
        self.quotes.find_by_owner(owner, limit).await
    }

    /// ACTIVE quotes of `owner` that have not yet passed their expiry.
    pub async fn find_active_by_owner(&self, owner: Uuid) -> Result<Vec<Quote>> {
        let now = Utc::now();
        Ok(self
            .quotes
            .find_by_owner(owner, usize::MAX)
            .await?
            .into_iter()
            .filter(|quote| quote.status == QuoteStatus::Active && !quote.is_expired_at(now))
            .collect())
    }
}

use super::money::{CurrencyCode, Money};
use super::quote::Quote;
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum RemittanceStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RemittanceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RemittanceStatus::Completed | RemittanceStatus::Failed)
    }

    fn can_transition_to(&self, next: RemittanceStatus) -> bool {
        matches!(
            (self, next),
            (RemittanceStatus::Pending, RemittanceStatus::Processing)
                | (RemittanceStatus::Processing, RemittanceStatus::Completed)
                | (RemittanceStatus::Processing, RemittanceStatus::Failed)
        )
    }
}

impl fmt::Display for RemittanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RemittanceStatus::Pending => "PENDING",
            RemittanceStatus::Processing => "PROCESSING",
            RemittanceStatus::Completed => "COMPLETED",
            RemittanceStatus::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Recipient {
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
}

/// One cross-currency transfer, with every amount snapshotted from the quote
/// it consumed.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Remittance {
    pub id: Uuid,
    pub quote_id: Uuid,
    pub sender_id: Uuid,
    pub sender_wallet_id: Uuid,
    pub recipient: Recipient,
    pub from_currency: CurrencyCode,
    pub to_currency: CurrencyCode,
    pub send_amount: Money,
    pub exchange_rate: Decimal,
    pub fee_amount: Money,
    pub receive_amount: Money,
    pub total_amount: Money,
    pub status: RemittanceStatus,
    pub provider_id: Option<String>,
    pub provider_status: Option<String>,
    pub error_message: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Remittance {
    pub fn pending(
        quote: &Quote,
        sender_wallet_id: Uuid,
        recipient: Recipient,
        idempotency_key: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            quote_id: quote.id,
            sender_id: quote.owner,
            sender_wallet_id,
            recipient,
            from_currency: quote.from_currency.clone(),
            to_currency: quote.to_currency.clone(),
            send_amount: quote.send_amount,
            exchange_rate: quote.rate,
            fee_amount: quote.fee_amount,
            receive_amount: quote.receive_amount,
            total_amount: quote.total_amount,
            status: RemittanceStatus::Pending,
            provider_id: None,
            provider_status: None,
            error_message: None,
            idempotency_key,
            created_at: now,
            processed_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    pub fn mark_processing(&mut self) -> Result<(), PaymentError> {
        self.transition(RemittanceStatus::Processing)?;
        self.processed_at = Some(self.updated_at);
        Ok(())
    }

    pub fn complete(
        &mut self,
        provider_id: String,
        provider_status: String,
    ) -> Result<(), PaymentError> {
        self.transition(RemittanceStatus::Completed)?;
        self.completed_at = Some(self.updated_at);
        self.provider_id = Some(provider_id);
        self.provider_status = Some(provider_status);
        Ok(())
    }

    pub fn fail(
        &mut self,
        error_message: String,
        provider_status: Option<String>,
    ) -> Result<(), PaymentError> {
        self.transition(RemittanceStatus::Failed)?;
        self.error_message = Some(error_message);
        if provider_status.is_some() {
            self.provider_status = provider_status;
        }
        Ok(())
    }

    fn transition(&mut self, next: RemittanceStatus) -> Result<(), PaymentError> {
        if !self.status.can_transition_to(next) {
            return Err(PaymentError::InvalidState(format!(
                "remittance {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

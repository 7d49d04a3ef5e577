use super::money::{Amount, CurrencyCode, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    RemittanceSend,
    Fee,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    #[default]
    Completed,
    Failed,
}

/// An append-only ledger row. Never mutated once stored.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub owner: Uuid,
    pub r#type: TransactionType,
    pub amount: Money,
    pub currency: CurrencyCode,
    pub balance_before: Money,
    pub balance_after: Money,
    pub status: TransactionStatus,
    pub description: String,
    /// Id of the remittance that produced this row, if any.
    pub reference_id: Option<Uuid>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// The caller-supplied part of a [`Transaction`].
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub wallet_id: Uuid,
    pub owner: Uuid,
    pub r#type: TransactionType,
    pub amount: Amount,
    pub currency: CurrencyCode,
    pub balance_before: Money,
    pub balance_after: Money,
    pub status: TransactionStatus,
    pub description: String,
    pub reference_id: Option<Uuid>,
    pub idempotency_key: Option<String>,
}

impl From<NewTransaction> for Transaction {
    fn from(new: NewTransaction) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            wallet_id: new.wallet_id,
            owner: new.owner,
            r#type: new.r#type,
            amount: new.amount.money(),
            currency: new.currency,
            balance_before: new.balance_before,
            balance_after: new.balance_after,
            status: new.status,
            description: new.description,
            reference_id: new.reference_id,
            idempotency_key: new.idempotency_key,
            created_at: now,
            completed_at: (new.status == TransactionStatus::Completed).then_some(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_completed_rows_get_completion_time() {
        let new = NewTransaction {
            wallet_id: Uuid::new_v4(),
            owner: Uuid::new_v4(),
            r#type: TransactionType::Deposit,
            amount: Amount::new(dec!(10)).unwrap(),
            currency: "CLP".parse().unwrap(),
            balance_before: Money::ZERO,
            balance_after: Money::new(dec!(10)),
            status: TransactionStatus::Completed,
            description: "Deposit".into(),
            reference_id: None,
            idempotency_key: None,
        };

        let pending = NewTransaction {
            status: TransactionStatus::Pending,
            ..new.clone()
        };

        assert!(Transaction::from(new).completed_at.is_some());
        assert!(Transaction::from(pending).completed_at.is_none());
    }

    #[test]
    fn test_type_serialization() {
        let json = serde_json::to_string(&TransactionType::RemittanceSend).unwrap();
        assert_eq!(json, "\"REMITTANCE_SEND\"");
    }
}

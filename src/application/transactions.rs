use crate::domain::ports::TransactionStoreRef;
use crate::domain::transaction::{NewTransaction, Transaction};
use crate::error::{PaymentError, Result};
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Append-only record of balance-affecting events.
pub struct TransactionLedger {
    store: TransactionStoreRef,
}

impl TransactionLedger {
    pub fn new(store: TransactionStoreRef) -> Self {
        Self { store }
    }

    pub async fn record(&self, new: NewTransaction) -> Result<Transaction> {
        let tx = Transaction::from(new);
        self.store.append(tx.clone()).await?;
        debug!(
            transaction_id = %tx.id,
            wallet_id = %tx.wallet_id,
            kind = ?tx.r#type,
            amount = %tx.amount,
            "transaction recorded"
        );
        Ok(tx)
    }

    pub async fn get(&self, tx_id: Uuid) -> Result<Transaction> {
        self.store
            .get(tx_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("Transaction", tx_id))
    }

    pub async fn find_by_wallet(&self, wallet_id: Uuid, limit: usize) -> Result<Vec<Transaction>> {
        self.store.find_by_wallet(wallet_id, limit).await
    }

    pub async fn find_by_owner(&self, owner: Uuid, limit: usize) -> Result<Vec<Transaction>> {
        self.store.find_by_owner(owner, limit).await
    }

    pub async fn find_by_reference(&self, reference_id: Uuid) -> Result<Vec<Transaction>> {
        self.store.find_by_reference(reference_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::{Amount, Money};
    use crate::domain::transaction::{TransactionStatus, TransactionType};
    use crate::infrastructure::in_memory::InMemoryTransactionStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn entry(wallet_id: Uuid, reference_id: Option<Uuid>, amount: rust_decimal::Decimal) -> NewTransaction {
        NewTransaction {
            wallet_id,
            owner: Uuid::nil(),
            r#type: TransactionType::Fee,
            amount: Amount::new(amount).unwrap(),
            currency: "CLP".parse().unwrap(),
            balance_before: Money::new(dec!(100)),
            balance_after: Money::new(dec!(100)),
            status: TransactionStatus::Completed,
            description: "fee".into(),
            reference_id,
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn test_record_and_query() {
        let ledger = TransactionLedger::new(Arc::new(InMemoryTransactionStore::new()));
        let wallet = Uuid::new_v4();
        let remittance = Uuid::new_v4();

        let first = ledger.record(entry(wallet, Some(remittance), dec!(1))).await.unwrap();
        ledger.record(entry(wallet, None, dec!(2))).await.unwrap();
        ledger.record(entry(Uuid::new_v4(), None, dec!(3))).await.unwrap();

        assert_eq!(ledger.get(first.id).await.unwrap(), first);
        assert_eq!(ledger.find_by_wallet(wallet, 10).await.unwrap().len(), 2);
        assert_eq!(ledger.find_by_wallet(wallet, 1).await.unwrap().len(), 1);

        let referenced = ledger.find_by_reference(remittance).await.unwrap();
        assert_eq!(referenced, vec![first]);
    }

    #[tokio::test]
    async fn test_missing_transaction() {
        let ledger = TransactionLedger::new(Arc::new(InMemoryTransactionStore::new()));
        assert!(matches!(
            ledger.get(Uuid::new_v4()).await,
            Err(PaymentError::NotFound { .. })
        ));
    }
}

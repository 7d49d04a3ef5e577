use crate::application::engine::EngineStores;
use crate::domain::idempotency::{IdempotencyKey, IdempotencyRecord};
use crate::domain::money::CurrencyCode;
use crate::domain::ports::{
    IdempotencyStore, QuoteStore, RemittanceStore, TransactionStore, WalletStore,
};
use crate::domain::quote::{Quote, QuoteStatus};
use crate::domain::remittance::{Remittance, RemittanceStatus};
use crate::domain::transaction::Transaction;
use crate::domain::wallet::Wallet;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Wallet rows keyed by wallet id.
///
/// `find_or_create` runs under the write lock, so concurrent first deposits
/// for the same (owner, currency) end up on one wallet.
#[derive(Default, Clone)]
pub struct InMemoryWalletStore {
    wallets: Arc<RwLock<HashMap<Uuid, Wallet>>>,
}

impl InMemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_active_for(wallet: &Wallet, owner: Uuid, currency: &CurrencyCode) -> bool {
    wallet.active && wallet.owner == owner && &wallet.currency == currency
}

#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn find_or_create(&self, owner: Uuid, currency: &CurrencyCode) -> Result<Wallet> {
        let mut wallets = self.wallets.write().await;
        if let Some(wallet) = wallets
            .values()
            .find(|wallet| is_active_for(wallet, owner, currency))
        {
            return Ok(wallet.clone());
        }
        let wallet = Wallet::new(owner, currency.clone());
        wallets.insert(wallet.id, wallet.clone());
        Ok(wallet)
    }

    async fn find_active(&self, owner: Uuid, currency: &CurrencyCode) -> Result<Option<Wallet>> {
        let wallets = self.wallets.read().await;
        Ok(wallets
            .values()
            .find(|wallet| is_active_for(wallet, owner, currency))
            .cloned())
    }

    async fn find_by_owner(&self, owner: Uuid) -> Result<Vec<Wallet>> {
        let wallets = self.wallets.read().await;
        Ok(wallets
            .values()
            .filter(|wallet| wallet.owner == owner)
            .cloned()
            .collect())
    }

    async fn get(&self, wallet_id: Uuid) -> Result<Option<Wallet>> {
        let wallets = self.wallets.read().await;
        Ok(wallets.get(&wallet_id).cloned())
    }

    async fn store(&self, wallet: Wallet) -> Result<()> {
        let mut wallets = self.wallets.write().await;
        wallets.insert(wallet.id, wallet);
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Wallet>> {
        let wallets = self.wallets.read().await;
        let mut all: Vec<Wallet> = wallets.values().cloned().collect();
        all.sort_by_key(|wallet| wallet.created_at);
        Ok(all)
    }
}

/// Append-only transaction log; insertion order is chronological order.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    transactions: Arc<RwLock<Vec<Transaction>>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn append(&self, tx: Transaction) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        transactions.push(tx);
        Ok(())
    }

    async fn get(&self, tx_id: Uuid) -> Result<Option<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions.iter().find(|tx| tx.id == tx_id).cloned())
    }

    async fn find_by_wallet(&self, wallet_id: Uuid, limit: usize) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions
            .iter()
            .rev()
            .filter(|tx| tx.wallet_id == wallet_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_by_owner(&self, owner: Uuid, limit: usize) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions
            .iter()
            .rev()
            .filter(|tx| tx.owner == owner)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_by_reference(&self, reference_id: Uuid) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions
            .iter()
            .filter(|tx| tx.reference_id == Some(reference_id))
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryQuoteStore {
    quotes: Arc<RwLock<HashMap<Uuid, Quote>>>,
}

impl InMemoryQuoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuoteStore for InMemoryQuoteStore {
    async fn insert(&self, quote: Quote) -> Result<()> {
        let mut quotes = self.quotes.write().await;
        quotes.insert(quote.id, quote);
        Ok(())
    }

    async fn get(&self, quote_id: Uuid) -> Result<Option<Quote>> {
        let quotes = self.quotes.read().await;
        Ok(quotes.get(&quote_id).cloned())
    }

    async fn mark_used(&self, quote_id: Uuid, used_at: DateTime<Utc>) -> Result<Quote> {
        let mut quotes = self.quotes.write().await;
        let quote = quotes
            .get_mut(&quote_id)
            .ok_or_else(|| PaymentError::not_found("Quote", quote_id))?;
        if quote.status != QuoteStatus::Active {
            return Err(PaymentError::InvalidState(format!(
                "quote {quote_id} is not active (status: {})",
                quote.status
            )));
        }
        quote.status = QuoteStatus::Used;
        quote.used_at = Some(used_at);
        Ok(quote.clone())
    }

    async fn mark_expired(&self, quote_id: Uuid) -> Result<Option<Quote>> {
        let mut quotes = self.quotes.write().await;
        Ok(quotes.get_mut(&quote_id).map(|quote| {
            if quote.status == QuoteStatus::Active {
                quote.status = QuoteStatus::Expired;
            }
            quote.clone()
        }))
    }

    async fn find_by_owner(&self, owner: Uuid, limit: usize) -> Result<Vec<Quote>> {
        let quotes = self.quotes.read().await;
        let mut owned: Vec<Quote> = quotes
            .values()
            .filter(|quote| quote.owner == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        owned.truncate(limit);
        Ok(owned)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryRemittanceStore {
    remittances: Arc<RwLock<HashMap<Uuid, Remittance>>>,
}

impl InMemoryRemittanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut remittances: Vec<Remittance>, limit: usize) -> Vec<Remittance> {
    remittances.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    remittances.truncate(limit);
    remittances
}

#[async_trait]
impl RemittanceStore for InMemoryRemittanceStore {
    async fn insert(&self, remittance: Remittance) -> Result<()> {
        let mut remittances = self.remittances.write().await;
        if remittances.contains_key(&remittance.id) {
            return Err(PaymentError::Conflict(format!(
                "remittance {} already exists",
                remittance.id
            )));
        }
        remittances.insert(remittance.id, remittance);
        Ok(())
    }

    async fn update(&self, remittance: Remittance) -> Result<()> {
        let mut remittances = self.remittances.write().await;
        match remittances.get_mut(&remittance.id) {
            Some(existing) => {
                *existing = remittance;
                Ok(())
            }
            None => Err(PaymentError::not_found("Remittance", remittance.id)),
        }
    }

    async fn get(&self, remittance_id: Uuid) -> Result<Option<Remittance>> {
        let remittances = self.remittances.read().await;
        Ok(remittances.get(&remittance_id).cloned())
    }

    async fn find_by_sender(&self, sender_id: Uuid, limit: usize) -> Result<Vec<Remittance>> {
        let remittances = self.remittances.read().await;
        let sent: Vec<Remittance> = remittances
            .values()
            .filter(|remittance| remittance.sender_id == sender_id)
            .cloned()
            .collect();
        Ok(newest_first(sent, limit))
    }

    async fn find_all(&self, limit: usize) -> Result<Vec<Remittance>> {
        let remittances = self.remittances.read().await;
        Ok(newest_first(remittances.values().cloned().collect(), limit))
    }

    async fn find_by_status_before(
        &self,
        status: RemittanceStatus,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Remittance>> {
        let remittances = self.remittances.read().await;
        Ok(remittances
            .values()
            .filter(|remittance| remittance.status == status && remittance.updated_at < cutoff)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryIdempotencyStore {
    records: Arc<RwLock<HashMap<(IdempotencyKey, String), IdempotencyRecord>>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn find(
        &self,
        key: &IdempotencyKey,
        endpoint: &str,
    ) -> Result<Option<IdempotencyRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&(key.clone(), endpoint.to_string())).cloned())
    }

    async fn save(&self, record: IdempotencyRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert((record.key.clone(), record.endpoint.clone()), record);
        Ok(())
    }

    async fn delete(&self, key: &IdempotencyKey, endpoint: &str) -> Result<()> {
        let mut records = self.records.write().await;
        records.remove(&(key.clone(), endpoint.to_string()));
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        Ok(before - records.len())
    }
}

/// One in-memory backend per entity.
#[derive(Default, Clone)]
pub struct InMemoryStores {
    pub wallets: Arc<InMemoryWalletStore>,
    pub transactions: Arc<InMemoryTransactionStore>,
    pub quotes: Arc<InMemoryQuoteStore>,
    pub remittances: Arc<InMemoryRemittanceStore>,
    pub idempotency: Arc<InMemoryIdempotencyStore>,
}

impl InMemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_engine_stores(self) -> EngineStores {
        EngineStores {
            wallets: self.wallets,
            transactions: self.transactions,
            quotes: self.quotes,
            remittances: self.remittances,
            idempotency: self.idempotency,
        }
    }
}

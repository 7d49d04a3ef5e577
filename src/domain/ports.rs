use super::directory::{ExchangeRate, ProviderRequest, ProviderResponse, UserProfile};
use super::idempotency::{IdempotencyKey, IdempotencyRecord};
use super::money::CurrencyCode;
use super::quote::Quote;
use super::remittance::{Remittance, RemittanceStatus};
use super::transaction::Transaction;
use super::wallet::Wallet;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Persistence for wallet rows.
///
/// Stores do not serialize mutations themselves; every balance change goes
/// through `WalletLedger`, which holds the per-wallet lock around its
/// read-modify-write.
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Returns the active wallet for (owner, currency), creating an empty one
    /// if none exists. Must be atomic with respect to concurrent callers.
    async fn find_or_create(&self, owner: Uuid, currency: &CurrencyCode) -> Result<Wallet>;
    async fn find_active(&self, owner: Uuid, currency: &CurrencyCode) -> Result<Option<Wallet>>;
    async fn find_by_owner(&self, owner: Uuid) -> Result<Vec<Wallet>>;
    async fn get(&self, wallet_id: Uuid) -> Result<Option<Wallet>>;
    async fn store(&self, wallet: Wallet) -> Result<()>;
    async fn get_all(&self) -> Result<Vec<Wallet>>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn append(&self, tx: Transaction) -> Result<()>;
    async fn get(&self, tx_id: Uuid) -> Result<Option<Transaction>>;
    /// Newest first.
    async fn find_by_wallet(&self, wallet_id: Uuid, limit: usize) -> Result<Vec<Transaction>>;
    /// Newest first.
    async fn find_by_owner(&self, owner: Uuid, limit: usize) -> Result<Vec<Transaction>>;
    async fn find_by_reference(&self, reference_id: Uuid) -> Result<Vec<Transaction>>;
}

#[async_trait]
pub trait QuoteStore: Send + Sync {
    async fn insert(&self, quote: Quote) -> Result<()>;
    async fn get(&self, quote_id: Uuid) -> Result<Option<Quote>>;
    /// Conditional ACTIVE -> USED write. Fails `InvalidState` when the quote
    /// is no longer active and `NotFound` when it does not exist.
    async fn mark_used(&self, quote_id: Uuid, used_at: DateTime<Utc>) -> Result<Quote>;
    /// Conditional ACTIVE -> EXPIRED write. A quote that already left ACTIVE
    /// is returned unchanged.
    async fn mark_expired(&self, quote_id: Uuid) -> Result<Option<Quote>>;
    /// Newest first.
    async fn find_by_owner(&self, owner: Uuid, limit: usize) -> Result<Vec<Quote>>;
}

#[async_trait]
pub trait RemittanceStore: Send + Sync {
    async fn insert(&self, remittance: Remittance) -> Result<()>;
    async fn update(&self, remittance: Remittance) -> Result<()>;
    async fn get(&self, remittance_id: Uuid) -> Result<Option<Remittance>>;
    /// Newest first.
    async fn find_by_sender(&self, sender_id: Uuid, limit: usize) -> Result<Vec<Remittance>>;
    /// Newest first.
    async fn find_all(&self, limit: usize) -> Result<Vec<Remittance>>;
    /// Remittances in `status` whose last update is older than `cutoff`.
    async fn find_by_status_before(
        &self,
        status: RemittanceStatus,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Remittance>>;
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn find(&self, key: &IdempotencyKey, endpoint: &str)
    -> Result<Option<IdempotencyRecord>>;
    async fn save(&self, record: IdempotencyRecord) -> Result<()>;
    async fn delete(&self, key: &IdempotencyKey, endpoint: &str) -> Result<()>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// Read access to the exchange-rate table.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fails `NotFound` when no rate is active for the pair right now.
    async fn get_active_rate(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> Result<ExchangeRate>;
    async fn get_all_active_rates(&self) -> Result<Vec<ExchangeRate>>;
}

/// The external payment rail. Calls are not idempotent on the rail's side.
#[async_trait]
pub trait RemittanceProvider: Send + Sync {
    async fn send_remittance(&self, request: ProviderRequest) -> Result<ProviderResponse>;
    async fn check_status(&self, external_id: &str) -> Result<String>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fails `NotFound` for unknown users.
    async fn find_one(&self, user_id: Uuid) -> Result<UserProfile>;
}

pub type WalletStoreRef = Arc<dyn WalletStore>;
pub type TransactionStoreRef = Arc<dyn TransactionStore>;
pub type QuoteStoreRef = Arc<dyn QuoteStore>;
pub type RemittanceStoreRef = Arc<dyn RemittanceStore>;
pub type IdempotencyStoreRef = Arc<dyn IdempotencyStore>;
pub type RateProviderRef = Arc<dyn RateProvider>;
pub type RemittanceProviderRef = Arc<dyn RemittanceProvider>;
pub type UserDirectoryRef = Arc<dyn UserDirectory>;

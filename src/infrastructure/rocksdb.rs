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
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

pub const CF_WALLETS: &str = "wallets";
pub const CF_TRANSACTIONS: &str = "transactions";
pub const CF_QUOTES: &str = "quotes";
pub const CF_REMITTANCES: &str = "remittances";
pub const CF_IDEMPOTENCY: &str = "idempotency";

const COLUMN_FAMILIES: [&str; 5] = [
    CF_WALLETS,
    CF_TRANSACTIONS,
    CF_QUOTES,
    CF_REMITTANCES,
    CF_IDEMPOTENCY,
];

/// A persistent store backed by RocksDB.
///
/// Every entity lives in its own column family as a JSON value keyed by its
/// id. Secondary lookups (by owner, sender, status) scan the column family.
///
/// Read-check-write sequences (`find_or_create`, the conditional quote
/// transitions, remittance insert/update) run under `write_lock`, so the
/// store is safe to share between tasks. `Clone` shares the handle.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a database at `path` with all column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// The same database behind every persistence port.
    pub fn into_engine_stores(self) -> EngineStores {
        let shared = Arc::new(self);
        EngineStores {
            wallets: shared.clone(),
            transactions: shared.clone(),
            quotes: shared.clone(),
            remittances: shared.clone(),
            idempotency: shared,
        }
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            PaymentError::InternalError(Box::new(std::io::Error::other(format!(
                "column family {name} not found"
            ))))
        })
    }

    fn put<T: Serialize>(&self, cf: &str, key: impl AsRef<[u8]>, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(self.cf(cf)?, key, bytes)?;
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(&self, cf: &str, key: impl AsRef<[u8]>) -> Result<Option<T>> {
        match self.db.get_pinned_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }

    fn active_wallet(&self, owner: Uuid, currency: &CurrencyCode) -> Result<Option<Wallet>> {
        Ok(self
            .scan::<Wallet>(CF_WALLETS)?
            .into_iter()
            .find(|wallet| wallet.active && wallet.owner == owner && &wallet.currency == currency))
    }
}

fn idempotency_key(key: &IdempotencyKey, endpoint: &str) -> String {
    format!("{key}|{endpoint}")
}

fn newest_first<T>(mut items: Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>, limit: usize) -> Vec<T> {
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    items.truncate(limit);
    items
}

#[async_trait]
impl WalletStore for RocksDBStore {
    async fn find_or_create(&self, owner: Uuid, currency: &CurrencyCode) -> Result<Wallet> {
        let _guard = self.write_lock.lock();
        if let Some(wallet) = self.active_wallet(owner, currency)? {
            return Ok(wallet);
        }
        let wallet = Wallet::new(owner, currency.clone());
        self.put(CF_WALLETS, wallet.id.as_bytes(), &wallet)?;
        Ok(wallet)
    }

    async fn find_active(&self, owner: Uuid, currency: &CurrencyCode) -> Result<Option<Wallet>> {
        self.active_wallet(owner, currency)
    }

    async fn find_by_owner(&self, owner: Uuid) -> Result<Vec<Wallet>> {
        Ok(self
            .scan::<Wallet>(CF_WALLETS)?
            .into_iter()
            .filter(|wallet| wallet.owner == owner)
            .collect())
    }

    async fn get(&self, wallet_id: Uuid) -> Result<Option<Wallet>> {
        self.fetch(CF_WALLETS, wallet_id.as_bytes())
    }

    async fn store(&self, wallet: Wallet) -> Result<()> {
        self.put(CF_WALLETS, wallet.id.as_bytes(), &wallet)
    }

    async fn get_all(&self) -> Result<Vec<Wallet>> {
        let mut wallets = self.scan::<Wallet>(CF_WALLETS)?;
        wallets.sort_by_key(|wallet| wallet.created_at);
        Ok(wallets)
    }
}

#[async_trait]
impl TransactionStore for RocksDBStore {
    async fn append(&self, tx: Transaction) -> Result<()> {
        self.put(CF_TRANSACTIONS, tx.id.as_bytes(), &tx)
    }

    async fn get(&self, tx_id: Uuid) -> Result<Option<Transaction>> {
        self.fetch(CF_TRANSACTIONS, tx_id.as_bytes())
    }

    async fn find_by_wallet(&self, wallet_id: Uuid, limit: usize) -> Result<Vec<Transaction>> {
        let matching: Vec<Transaction> = self
            .scan::<Transaction>(CF_TRANSACTIONS)?
            .into_iter()
            .filter(|tx| tx.wallet_id == wallet_id)
            .collect();
        Ok(newest_first(matching, |tx| tx.created_at, limit))
    }

    async fn find_by_owner(&self, owner: Uuid, limit: usize) -> Result<Vec<Transaction>> {
        let matching: Vec<Transaction> = self
            .scan::<Transaction>(CF_TRANSACTIONS)?
            .into_iter()
            .filter(|tx| tx.owner == owner)
            .collect();
        Ok(newest_first(matching, |tx| tx.created_at, limit))
    }

    async fn find_by_reference(&self, reference_id: Uuid) -> Result<Vec<Transaction>> {
        let mut matching: Vec<Transaction> = self
            .scan::<Transaction>(CF_TRANSACTIONS)?
            .into_iter()
            .filter(|tx| tx.reference_id == Some(reference_id))
            .collect();
        matching.sort_by_key(|tx| tx.created_at);
        Ok(matching)
    }
}

#[async_trait]
impl QuoteStore for RocksDBStore {
    async fn insert(&self, quote: Quote) -> Result<()> {
        self.put(CF_QUOTES, quote.id.as_bytes(), &quote)
    }

    async fn get(&self, quote_id: Uuid) -> Result<Option<Quote>> {
        self.fetch(CF_QUOTES, quote_id.as_bytes())
    }

    async fn mark_used(&self, quote_id: Uuid, used_at: DateTime<Utc>) -> Result<Quote> {
        let _guard = self.write_lock.lock();
        let mut quote: Quote = self
            .fetch(CF_QUOTES, quote_id.as_bytes())?
            .ok_or_else(|| PaymentError::not_found("Quote", quote_id))?;
        if quote.status != QuoteStatus::Active {
            return Err(PaymentError::InvalidState(format!(
                "quote {quote_id} is not active (status: {})",
                quote.status
            )));
        }
        quote.status = QuoteStatus::Used;
        quote.used_at = Some(used_at);
        self.put(CF_QUOTES, quote_id.as_bytes(), &quote)?;
        Ok(quote)
    }

    async fn mark_expired(&self, quote_id: Uuid) -> Result<Option<Quote>> {
        let _guard = self.write_lock.lock();
        let Some(mut quote) = self.fetch::<Quote>(CF_QUOTES, quote_id.as_bytes())? else {
            return Ok(None);
        };
        if quote.status == QuoteStatus::Active {
            quote.status = QuoteStatus::Expired;
            self.put(CF_QUOTES, quote_id.as_bytes(), &quote)?;
        }
        Ok(Some(quote))
    }

    async fn find_by_owner(&self, owner: Uuid, limit: usize) -> Result<Vec<Quote>> {
        let owned: Vec<Quote> = self
            .scan::<Quote>(CF_QUOTES)?
            .into_iter()
            .filter(|quote| quote.owner == owner)
            .collect();
        Ok(newest_first(owned, |quote| quote.created_at, limit))
    }
}

#[async_trait]
impl RemittanceStore for RocksDBStore {
    async fn insert(&self, remittance: Remittance) -> Result<()> {
        let _guard = self.write_lock.lock();
        if self
            .fetch::<Remittance>(CF_REMITTANCES, remittance.id.as_bytes())?
            .is_some()
        {
            return Err(PaymentError::Conflict(format!(
                "remittance {} already exists",
                remittance.id
            )));
        }
        self.put(CF_REMITTANCES, remittance.id.as_bytes(), &remittance)
    }

    async fn update(&self, remittance: Remittance) -> Result<()> {
        let _guard = self.write_lock.lock();
        if self
            .fetch::<Remittance>(CF_REMITTANCES, remittance.id.as_bytes())?
            .is_none()
        {
            return Err(PaymentError::not_found("Remittance", remittance.id));
        }
        self.put(CF_REMITTANCES, remittance.id.as_bytes(), &remittance)
    }

    async fn get(&self, remittance_id: Uuid) -> Result<Option<Remittance>> {
        self.fetch(CF_REMITTANCES, remittance_id.as_bytes())
    }

    async fn find_by_sender(&self, sender_id: Uuid, limit: usize) -> Result<Vec<Remittance>> {
        let sent: Vec<Remittance> = self
            .scan::<Remittance>(CF_REMITTANCES)?
            .into_iter()
            .filter(|remittance| remittance.sender_id == sender_id)
            .collect();
        Ok(newest_first(sent, |remittance| remittance.created_at, limit))
    }

    async fn find_all(&self, limit: usize) -> Result<Vec<Remittance>> {
        Ok(newest_first(
            self.scan(CF_REMITTANCES)?,
            |remittance: &Remittance| remittance.created_at,
            limit,
        ))
    }

    async fn find_by_status_before(
        &self,
        status: RemittanceStatus,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Remittance>> {
        Ok(self
            .scan::<Remittance>(CF_REMITTANCES)?
            .into_iter()
            .filter(|remittance| remittance.status == status && remittance.updated_at < cutoff)
            .collect())
    }
}

#[async_trait]
impl IdempotencyStore for RocksDBStore {
    async fn find(
        &self,
        key: &IdempotencyKey,
        endpoint: &str,
    ) -> Result<Option<IdempotencyRecord>> {
        self.fetch(CF_IDEMPOTENCY, idempotency_key(key, endpoint))
    }

    async fn save(&self, record: IdempotencyRecord) -> Result<()> {
        self.put(
            CF_IDEMPOTENCY,
            idempotency_key(&record.key, &record.endpoint),
            &record,
        )
    }

    async fn delete(&self, key: &IdempotencyKey, endpoint: &str) -> Result<()> {
        self.db
            .delete_cf(self.cf(CF_IDEMPOTENCY)?, idempotency_key(key, endpoint))?;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let _guard = self.write_lock.lock();
        let cf = self.cf(CF_IDEMPOTENCY)?;
        let mut purged = 0;
        for record in self.scan::<IdempotencyRecord>(CF_IDEMPOTENCY)? {
            if record.is_expired_at(now) {
                self.db
                    .delete_cf(cf, idempotency_key(&record.key, &record.endpoint))?;
                purged += 1;
            }
        }
        Ok(purged)
    }
}

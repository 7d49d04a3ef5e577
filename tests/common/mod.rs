#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use chrono::DateTime;
use remittance_engine::application::engine::{
    DepositRequest, EngineStores, ExternalServices, RemittanceEngine, SendRemittanceRequest,
};
use remittance_engine::config::EngineConfig;
use remittance_engine::domain::directory::{ProviderRequest, ProviderResponse, UserProfile};
use remittance_engine::domain::money::CurrencyCode;
use remittance_engine::domain::ports::{
    RemittanceProvider, RemittanceStore, RemittanceStoreRef, TransactionStore,
    TransactionStoreRef,
};
use remittance_engine::domain::remittance::{Remittance, RemittanceStatus};
use remittance_engine::domain::transaction::{Transaction, TransactionType};
use remittance_engine::error::{PaymentError, Result};
use remittance_engine::infrastructure::in_memory::InMemoryStores;
use remittance_engine::infrastructure::providers::{InMemoryUserDirectory, StaticRateTable};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Succeed,
    Fail,
    Error,
    Panic,
}

/// Payout provider with a fixed answer that counts how often it is called.
pub struct ScriptedProvider {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemittanceProvider for ScriptedProvider {
    async fn send_remittance(&self, request: ProviderRequest) -> Result<ProviderResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let response = |success: bool, status: &str| ProviderResponse {
            success,
            external_id: format!("EXT-TEST-{n}"),
            status: status.to_string(),
            message: format!("{} {} to {}", status, request.amount, request.recipient_email),
            timestamp: Utc::now(),
        };
        match self.script {
            Script::Succeed => Ok(response(true, "completed")),
            Script::Fail => Ok(response(false, "failed")),
            Script::Error => Err(PaymentError::ExternalFailure("connection reset".into())),
            Script::Panic => panic!("provider crashed"),
        }
    }

    async fn check_status(&self, _external_id: &str) -> Result<String> {
        Ok("completed".to_string())
    }
}

fn disk_full() -> PaymentError {
    PaymentError::InternalError("disk full".into())
}

/// Transaction store that refuses to append rows of one type.
pub struct RejectingTransactions {
    pub inner: TransactionStoreRef,
    pub rejected: TransactionType,
}

#[async_trait]
impl TransactionStore for RejectingTransactions {
    async fn append(&self, tx: Transaction) -> Result<()> {
        if tx.r#type == self.rejected {
            return Err(disk_full());
        }
        self.inner.append(tx).await
    }

    async fn get(&self, tx_id: Uuid) -> Result<Option<Transaction>> {
        self.inner.get(tx_id).await
    }

    async fn find_by_wallet(&self, wallet_id: Uuid, limit: usize) -> Result<Vec<Transaction>> {
        self.inner.find_by_wallet(wallet_id, limit).await
    }

    async fn find_by_owner(&self, owner: Uuid, limit: usize) -> Result<Vec<Transaction>> {
        self.inner.find_by_owner(owner, limit).await
    }

    async fn find_by_reference(&self, reference_id: Uuid) -> Result<Vec<Transaction>> {
        self.inner.find_by_reference(reference_id).await
    }
}

/// Remittance store whose inserts always fail.
pub struct RejectingRemittanceInserts {
    pub inner: RemittanceStoreRef,
}

#[async_trait]
impl RemittanceStore for RejectingRemittanceInserts {
    async fn insert(&self, _remittance: Remittance) -> Result<()> {
        Err(disk_full())
    }

    async fn update(&self, remittance: Remittance) -> Result<()> {
        self.inner.update(remittance).await
    }

    async fn get(&self, remittance_id: Uuid) -> Result<Option<Remittance>> {
        self.inner.get(remittance_id).await
    }

    async fn find_by_sender(&self, sender_id: Uuid, limit: usize) -> Result<Vec<Remittance>> {
        self.inner.find_by_sender(sender_id, limit).await
    }

    async fn find_all(&self, limit: usize) -> Result<Vec<Remittance>> {
        self.inner.find_all(limit).await
    }

    async fn find_by_status_before(
        &self,
        status: RemittanceStatus,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Remittance>> {
        self.inner.find_by_status_before(status, cutoff).await
    }
}

pub fn clp() -> CurrencyCode {
    "CLP".parse().unwrap()
}

pub fn pen() -> CurrencyCode {
    "PEN".parse().unwrap()
}

pub struct Harness {
    pub engine: Arc<RemittanceEngine>,
    pub stores: InMemoryStores,
    pub users: Arc<InMemoryUserDirectory>,
    pub provider: Arc<ScriptedProvider>,
}

pub fn harness(script: Script) -> Harness {
    harness_with(script, EngineConfig::default())
}

pub fn harness_with(script: Script, config: EngineConfig) -> Harness {
    harness_wired(script, config, |stores| stores)
}

/// Like [`harness_with`], but lets the test swap in its own store adapters
/// before the engine is built. `Harness::stores` still points at the
/// in-memory stores underneath.
pub fn harness_wired(
    script: Script,
    config: EngineConfig,
    wire: impl FnOnce(EngineStores) -> EngineStores,
) -> Harness {
    let stores = InMemoryStores::new();
    let users = Arc::new(InMemoryUserDirectory::new());
    let provider = Arc::new(ScriptedProvider::new(script));
    let engine = RemittanceEngine::new(
        wire(stores.clone().into_engine_stores()),
        ExternalServices {
            rates: Arc::new(StaticRateTable::with_defaults().unwrap()),
            users: users.clone(),
            provider: provider.clone(),
        },
        &config,
    );
    Harness {
        engine: Arc::new(engine),
        stores,
        users,
        provider,
    }
}

impl Harness {
    pub async fn register(&self, first_name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.users
            .register(UserProfile {
                id,
                first_name: first_name.to_string(),
                last_name: "Tester".to_string(),
                email: format!("{}@example.com", first_name.to_lowercase()),
            })
            .await;
        id
    }

    /// Registers a user and funds their CLP wallet.
    pub async fn funded_sender(&self, amount: Decimal) -> Uuid {
        let user = self.register("Ana").await;
        self.engine
            .deposit(
                DepositRequest {
                    user_id: user,
                    currency: clp(),
                    amount,
                },
                None,
            )
            .await
            .unwrap();
        user
    }

    /// Quotes `amount` CLP->PEN and sends it.
    pub async fn remit(
        &self,
        user: Uuid,
        amount: Decimal,
        idempotency_key: Option<&str>,
    ) -> Result<Remittance> {
        let quote = self.engine.quotes().create(user, &clp(), &pen(), amount).await?;
        self.send(quote.id, idempotency_key).await
    }

    pub async fn send(&self, quote_id: Uuid, idempotency_key: Option<&str>) -> Result<Remittance> {
        self.engine
            .send_remittance(
                SendRemittanceRequest {
                    quote_id,
                    recipient_email: "luis@example.pe".into(),
                    recipient_name: "Luis Quispe".into(),
                    recipient_phone: None,
                },
                idempotency_key,
            )
            .await?
            .decode()
    }
}

use super::idempotency::IdempotencyGate;
use super::ledger::WalletLedger;
use super::quotes::QuoteEngine;
use super::remittance::{RemittanceOrchestrator, SendRemittance};
use super::transactions::TransactionLedger;
use crate::config::EngineConfig;
use crate::domain::idempotency::StoredResponse;
use crate::domain::money::CurrencyCode;
use crate::domain::ports::{
    IdempotencyStoreRef, QuoteStoreRef, RateProviderRef, RemittanceProviderRef,
    RemittanceStoreRef, TransactionStoreRef, UserDirectoryRef, WalletStoreRef,
};
use crate::domain::remittance::Recipient;
use crate::domain::wallet::Wallet;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const DEPOSIT_ENDPOINT: &str = "POST /wallets/deposit";
pub const SEND_REMITTANCE_ENDPOINT: &str = "POST /remittances/send";

/// Persistence backends, one per entity.
pub struct EngineStores {
    pub wallets: WalletStoreRef,
    pub transactions: TransactionStoreRef,
    pub quotes: QuoteStoreRef,
    pub remittances: RemittanceStoreRef,
    pub idempotency: IdempotencyStoreRef,
}

/// Systems owned by someone else.
pub struct ExternalServices {
    pub rates: RateProviderRef,
    pub users: UserDirectoryRef,
    pub provider: RemittanceProviderRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepositRequest {
    pub user_id: Uuid,
    pub currency: CurrencyCode,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SendRemittanceRequest {
    pub quote_id: Uuid,
    pub recipient_email: String,
    pub recipient_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_phone: Option<String>,
}

/// The entry point of the engine.
///
/// Wires the services together over one set of stores. The two mutating
/// entry points, [`deposit`](Self::deposit) and
/// [`send_remittance`](Self::send_remittance), run behind the idempotency gate;
/// everything else is reached through the service accessors.
pub struct RemittanceEngine {
    wallets: WalletStoreRef,
    ledger: Arc<WalletLedger>,
    transactions: Arc<TransactionLedger>,
    quotes: Arc<QuoteEngine>,
    remittances: Arc<RemittanceOrchestrator>,
    gate: IdempotencyGate,
}

impl RemittanceEngine {
    pub fn new(stores: EngineStores, external: ExternalServices, config: &EngineConfig) -> Self {
        let transactions = Arc::new(TransactionLedger::new(stores.transactions));
        let ledger = Arc::new(WalletLedger::new(
            stores.wallets.clone(),
            transactions.clone(),
        ));
        let quotes = Arc::new(QuoteEngine::new(stores.quotes, external.rates, config));
        let remittances = Arc::new(RemittanceOrchestrator::new(
            quotes.clone(),
            ledger.clone(),
            stores.remittances,
            external.users,
            external.provider,
        ));

        Self {
            wallets: stores.wallets,
            ledger,
            transactions,
            quotes,
            remittances,
            gate: IdempotencyGate::new(stores.idempotency, config),
        }
    }

    /// Idempotent deposit. The response body is the updated [`Wallet`].
    pub async fn deposit(
        &self,
        request: DepositRequest,
        idempotency_key: Option<&str>,
    ) -> Result<StoredResponse> {
        self.gate
            .execute(idempotency_key, DEPOSIT_ENDPOINT, &request, || async {
                let wallet = self
                    .ledger
                    .deposit(
                        request.user_id,
                        &request.currency,
                        request.amount,
                        idempotency_key.map(str::to_string),
                    )
                    .await?;
                StoredResponse::created(&wallet)
            })
            .await
    }

    /// Idempotent remittance send. The response body is the
    /// [`Remittance`](crate::domain::remittance::Remittance) in its terminal
    /// state, COMPLETED or FAILED.
    pub async fn send_remittance(
        &self,
        request: SendRemittanceRequest,
        idempotency_key: Option<&str>,
    ) -> Result<StoredResponse> {
        self.gate
            .execute(idempotency_key, SEND_REMITTANCE_ENDPOINT, &request, || async {
                let remittance = self
                    .remittances
                    .send(
                        SendRemittance {
                            quote_id: request.quote_id,
                            recipient: Recipient {
                                email: request.recipient_email.clone(),
                                name: request.recipient_name.clone(),
                                phone: request.recipient_phone.clone(),
                            },
                        },
                        idempotency_key.map(str::to_string),
                    )
                    .await?;
                StoredResponse::created(&remittance)
            })
            .await
    }

    pub fn ledger(&self) -> &WalletLedger {
        &self.ledger
    }

    pub fn transactions(&self) -> &TransactionLedger {
        &self.transactions
    }

    pub fn quotes(&self) -> &QuoteEngine {
        &self.quotes
    }

    pub fn remittances(&self) -> &RemittanceOrchestrator {
        &self.remittances
    }

    pub fn idempotency(&self) -> &IdempotencyGate {
        &self.gate
    }

    /// Every wallet in the store, active or not.
    pub async fn wallets(&self) -> Result<Vec<Wallet>> {
        self.wallets.get_all().await
    }
}

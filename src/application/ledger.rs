use super::locks::KeyedLocks;
use super::transactions::TransactionLedger;
use crate::domain::money::{Amount, CurrencyCode};
use crate::domain::ports::WalletStoreRef;
use crate::domain::transaction::{NewTransaction, TransactionStatus, TransactionType};
use crate::domain::wallet::Wallet;
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Owner of every wallet balance mutation.
///
/// Each mutating operation runs its read-modify-write while holding the
/// wallet's entry in `locks`, so two operations on the same wallet never
/// interleave while operations on different wallets run concurrently. All
/// writers of a given store must share one `WalletLedger`.
pub struct WalletLedger {
    wallets: WalletStoreRef,
    transactions: Arc<TransactionLedger>,
    locks: KeyedLocks<Uuid>,
}

impl WalletLedger {
    pub fn new(wallets: WalletStoreRef, transactions: Arc<TransactionLedger>) -> Self {
        Self {
            wallets,
            transactions,
            locks: KeyedLocks::new(),
        }
    }

    /// Credits `amount` to the owner's wallet for `currency`, creating the
    /// wallet on first use, and appends a DEPOSIT row.
    ///
    /// The credit and the row land together: if the row cannot be appended
    /// the credit is rolled back and the append error returned.
    pub async fn deposit(
        &self,
        owner: Uuid,
        currency: &CurrencyCode,
        amount: Decimal,
        idempotency_key: Option<String>,
    ) -> Result<Wallet> {
        let amount = Amount::new(amount)?;
        let wallet = self.wallets.find_or_create(owner, currency).await?;

        let (_, after) = self
            .mutate_recorded(
                wallet.id,
                |wallet| wallet.deposit(amount),
                |before, after| {
                    Ok(vec![NewTransaction {
                        wallet_id: after.id,
                        owner,
                        r#type: TransactionType::Deposit,
                        amount,
                        currency: currency.clone(),
                        balance_before: before.balance,
                        balance_after: after.balance,
                        status: TransactionStatus::Completed,
                        description: "Deposit".to_string(),
                        reference_id: None,
                        idempotency_key,
                    }])
                },
            )
            .await?;

        info!(
            wallet_id = %after.id,
            %owner,
            %currency,
            %amount,
            balance = %after.balance,
            "deposit applied"
        );
        Ok(after)
    }

    /// Reserves `amount` of the wallet's available balance.
    pub async fn hold(&self, wallet_id: Uuid, amount: Amount) -> Result<Wallet> {
        let (_, after) = self.mutate(wallet_id, |wallet| wallet.hold(amount)).await?;
        debug!(%wallet_id, %amount, available = %after.available_balance, "funds held");
        Ok(after)
    }

    /// Returns previously held funds to the available balance.
    pub async fn release(&self, wallet_id: Uuid, amount: Amount) -> Result<Wallet> {
        let (_, after) = self
            .mutate(wallet_id, |wallet| wallet.release(amount))
            .await?;
        debug!(%wallet_id, %amount, available = %after.available_balance, "hold released");
        Ok(after)
    }

    /// Removes previously held funds from the ledger.
    pub async fn deduct(&self, wallet_id: Uuid, amount: Amount) -> Result<Wallet> {
        let (_, after) = self
            .mutate(wallet_id, |wallet| wallet.deduct(amount))
            .await?;
        debug!(%wallet_id, %amount, balance = %after.balance, "held funds deducted");
        Ok(after)
    }

    /// Deducts held `total` and appends the ledger rows built by `legs` from
    /// the wallet before and after the deduction.
    ///
    /// Runs under one hold of the wallet's lock. If any row fails to append,
    /// the wallet is put back as it was, so the held funds can still be
    /// released. Rows appended before the failure stay in the log.
    pub async fn settle<L>(&self, wallet_id: Uuid, total: Amount, legs: L) -> Result<Wallet>
    where
        L: FnOnce(&Wallet, &Wallet) -> Result<Vec<NewTransaction>>,
    {
        let (_, after) = self
            .mutate_recorded(wallet_id, |wallet| wallet.deduct(total), legs)
            .await?;
        debug!(%wallet_id, %total, balance = %after.balance, "remittance settled");
        Ok(after)
    }

    pub async fn deactivate(&self, wallet_id: Uuid) -> Result<Wallet> {
        let (_, after) = self
            .mutate(wallet_id, |wallet| {
                wallet.deactivate();
                Ok(())
            })
            .await?;
        info!(%wallet_id, "wallet deactivated");
        Ok(after)
    }

    pub async fn get(&self, wallet_id: Uuid) -> Result<Wallet> {
        self.wallets
            .get(wallet_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("Wallet", wallet_id))
    }

    pub async fn find_or_create(&self, owner: Uuid, currency: &CurrencyCode) -> Result<Wallet> {
        self.wallets.find_or_create(owner, currency).await
    }

    pub async fn find_by_owner_and_currency(
        &self,
        owner: Uuid,
        currency: &CurrencyCode,
    ) -> Result<Wallet> {
        self.wallets
            .find_active(owner, currency)
            .await?
            .ok_or_else(|| PaymentError::not_found("Wallet", format!("{owner}/{currency}")))
    }

    /// Active wallets of `owner`, ordered by currency.
    pub async fn find_all_by_owner(&self, owner: Uuid) -> Result<Vec<Wallet>> {
        let mut wallets: Vec<Wallet> = self
            .wallets
            .find_by_owner(owner)
            .await?
            .into_iter()
            .filter(|wallet| wallet.active)
            .collect();
        wallets.sort_by(|a, b| a.currency.cmp(&b.currency));
        Ok(wallets)
    }

    /// Runs `op` against the current wallet row under the wallet's lock and
    /// persists the result. Returns the row before and after the change.
    async fn mutate<F>(&self, wallet_id: Uuid, op: F) -> Result<(Wallet, Wallet)>
    where
        F: FnOnce(&mut Wallet) -> Result<()>,
    {
        self.mutate_recorded(wallet_id, op, |_, _| Ok(Vec::new()))
            .await
    }

    /// [`mutate`](Self::mutate), then appends `rows` while still holding the
    /// lock. A failed append restores the previous wallet row.
    async fn mutate_recorded<F, R>(
        &self,
        wallet_id: Uuid,
        op: F,
        rows: R,
    ) -> Result<(Wallet, Wallet)>
    where
        F: FnOnce(&mut Wallet) -> Result<()>,
        R: FnOnce(&Wallet, &Wallet) -> Result<Vec<NewTransaction>>,
    {
        let _guard = self.locks.acquire(&wallet_id).await;

        let before = self.get(wallet_id).await?;
        let mut after = before.clone();
        op(&mut after)?;
        debug_assert!(after.is_consistent());
        let rows = rows(&before, &after)?;

        self.wallets.store(after.clone()).await?;
        for row in rows {
            if let Err(err) = self.transactions.record(row).await {
                if let Err(restore_err) = self.wallets.store(before.clone()).await {
                    error!(
                        %wallet_id,
                        error = %restore_err,
                        "failed to restore wallet after ledger append error"
                    );
                } else {
                    warn!(%wallet_id, error = %err, "ledger append failed, wallet restored");
                }
                return Err(err);
            }
        }
        Ok((before, after))
    }
}

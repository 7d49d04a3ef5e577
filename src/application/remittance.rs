use super::ledger::WalletLedger;
use super::quotes::QuoteEngine;
use crate::domain::directory::{ProviderRequest, ProviderResponse, UserProfile};
use crate::domain::money::{Amount, Money};
use crate::domain::ports::{RemittanceProviderRef, RemittanceStoreRef, UserDirectoryRef};
use crate::domain::quote::Quote;
use crate::domain::remittance::{Recipient, Remittance, RemittanceStatus};
use crate::domain::transaction::{NewTransaction, TransactionStatus, TransactionType};
use crate::error::{PaymentError, Result};
use chrono::{Duration, Utc};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DEFAULT_SENDER_LIMIT: usize = 20;
pub const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Debug, Clone)]
pub struct SendRemittance {
    pub quote_id: Uuid,
    pub recipient: Recipient,
}

/// Drives a remittance from quote to a terminal state.
///
/// Once a hold is placed the remittance always ends COMPLETED (funds deducted)
/// or FAILED (funds released); the provider call is made at most once.
pub struct RemittanceOrchestrator {
    quotes: Arc<QuoteEngine>,
    ledger: Arc<WalletLedger>,
    remittances: RemittanceStoreRef,
    users: UserDirectoryRef,
    provider: RemittanceProviderRef,
}

impl RemittanceOrchestrator {
    pub fn new(
        quotes: Arc<QuoteEngine>,
        ledger: Arc<WalletLedger>,
        remittances: RemittanceStoreRef,
        users: UserDirectoryRef,
        provider: RemittanceProviderRef,
    ) -> Self {
        Self {
            quotes,
            ledger,
            remittances,
            users,
            provider,
        }
    }

    /// Executes a remittance against an active quote.
    ///
    /// Errors before the hold leave no trace. A provider rejection, error or
    /// panic is not an error of this call: the hold is released and the
    /// returned remittance is FAILED.
    pub async fn send(
        &self,
        request: SendRemittance,
        idempotency_key: Option<String>,
    ) -> Result<Remittance> {
        let quote = self.quotes.find_active_quote(request.quote_id).await?;
        let sender = self.users.find_one(quote.owner).await?;
        let wallet = self
            .ledger
            .find_by_owner_and_currency(quote.owner, &quote.from_currency)
            .await?;

        if wallet.available_balance < quote.total_amount {
            return Err(PaymentError::InsufficientFunds {
                required: quote.total_amount,
                available: wallet.available_balance,
            });
        }
        let total = Amount::try_from(quote.total_amount)?;

        let mut remittance =
            Remittance::pending(&quote, wallet.id, request.recipient, idempotency_key);
        self.reserve(&mut remittance, &quote, total).await?;
        info!(
            remittance_id = %remittance.id,
            quote_id = %quote.id,
            wallet_id = %wallet.id,
            total = %quote.total_amount,
            "remittance processing"
        );

        match self.dispatch(&quote, &sender, &remittance.recipient).await {
            Ok(response) if response.success => {
                if let Err(err) = self.settle(&mut remittance, &quote, total, &response).await {
                    self.compensate(&mut remittance, total, err.to_string(), None)
                        .await?;
                }
            }
            Ok(response) => {
                self.compensate(
                    &mut remittance,
                    total,
                    response.message,
                    Some(response.status),
                )
                .await?;
            }
            Err(err) => {
                self.compensate(&mut remittance, total, err.to_string(), None)
                    .await?;
            }
        }

        self.remittances.update(remittance.clone()).await?;
        info!(
            remittance_id = %remittance.id,
            status = %remittance.status,
            provider_id = ?remittance.provider_id,
            "remittance finished"
        );
        Ok(remittance)
    }

    /// Holds the funds, consumes the quote and persists the PROCESSING row.
    /// Anything failing after the hold releases it again.
    async fn reserve(&self, remittance: &mut Remittance, quote: &Quote, total: Amount) -> Result<()> {
        let wallet_id = remittance.sender_wallet_id;
        self.ledger.hold(wallet_id, total).await?;

        let reserved = async {
            self.quotes.mark_as_used(quote.id).await?;
            remittance.mark_processing()?;
            self.remittances.insert(remittance.clone()).await
        }
        .await;

        if let Err(err) = reserved {
            if let Err(release_err) = self.ledger.release(wallet_id, total).await {
                error!(
                    remittance_id = %remittance.id,
                    %wallet_id,
                    error = %release_err,
                    "failed to release hold after reservation error"
                );
            }
            return Err(err);
        }
        Ok(())
    }

    /// Calls the provider once. A panic inside the call becomes an
    /// `ExternalFailure`.
    async fn dispatch(
        &self,
        quote: &Quote,
        sender: &UserProfile,
        recipient: &Recipient,
    ) -> Result<ProviderResponse> {
        let request = ProviderRequest {
            recipient_email: recipient.email.clone(),
            recipient_name: recipient.name.clone(),
            recipient_phone: recipient.phone.clone(),
            amount: quote.receive_amount,
            currency: quote.to_currency.clone(),
            sender_name: sender.full_name(),
            sender_email: sender.email.clone(),
        };

        match AssertUnwindSafe(self.provider.send_remittance(request))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(PaymentError::ExternalFailure(format!(
                "provider panicked: {}",
                panic_message(panic.as_ref())
            ))),
        }
    }

    /// Deducts the held funds and appends the send and fee legs in one step
    /// of the wallet ledger. On error the hold is still in place.
    async fn settle(
        &self,
        remittance: &mut Remittance,
        quote: &Quote,
        total: Amount,
        response: &ProviderResponse,
    ) -> Result<()> {
        let settling: &Remittance = remittance;
        self.ledger
            .settle(settling.sender_wallet_id, total, |before, after| {
                let after_send = before.balance.checked_sub(quote.send_amount)?;
                let mut legs = vec![leg(
                    settling,
                    TransactionType::RemittanceSend,
                    quote.send_amount,
                    (before.balance, after_send),
                    format!("Remittance to {}", settling.recipient.name),
                )?];
                // A zero fee (0% configured) has no leg of its own.
                if quote.fee_amount.is_positive() {
                    legs.push(leg(
                        settling,
                        TransactionType::Fee,
                        quote.fee_amount,
                        (after_send, after.balance),
                        "Remittance fee".to_string(),
                    )?);
                }
                Ok(legs)
            })
            .await?;

        remittance.complete(response.external_id.clone(), response.status.clone())
    }

    /// Releases the hold and marks the remittance FAILED.
    async fn compensate(
        &self,
        remittance: &mut Remittance,
        total: Amount,
        message: String,
        provider_status: Option<String>,
    ) -> Result<()> {
        let wallet_id = remittance.sender_wallet_id;
        if let Err(release_err) = self.ledger.release(wallet_id, total).await {
            // Left for the reconciliation sweep; the remittance still goes FAILED.
            error!(
                remittance_id = %remittance.id,
                %wallet_id,
                error = %release_err,
                "compensating release failed"
            );
        }
        warn!(remittance_id = %remittance.id, reason = %message, "remittance failed");
        remittance.fail(message, provider_status)
    }

    pub async fn find_one(&self, remittance_id: Uuid) -> Result<Remittance> {
        self.remittances
            .get(remittance_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("Remittance", remittance_id))
    }

    pub async fn find_by_sender(&self, sender_id: Uuid, limit: usize) -> Result<Vec<Remittance>> {
        self.remittances.find_by_sender(sender_id, limit).await
    }

    pub async fn find_all(&self, limit: usize) -> Result<Vec<Remittance>> {
        self.remittances.find_all(limit).await
    }

    /// PROCESSING remittances untouched for longer than `older_than`.
    pub async fn find_stuck(&self, older_than: Duration) -> Result<Vec<Remittance>> {
        let now = Utc::now();
        let cutoff = now.checked_sub_signed(older_than).ok_or_else(|| {
            PaymentError::ValidationError(format!("stuck cutoff {now} - {older_than} is out of range"))
        })?;
        self.remittances
            .find_by_status_before(RemittanceStatus::Processing, cutoff)
            .await
    }

    /// Asks the provider for the current status of a dispatched remittance.
    pub async fn provider_status(&self, remittance_id: Uuid) -> Result<String> {
        let remittance = self.find_one(remittance_id).await?;
        let Some(external_id) = remittance.provider_id else {
            return Err(PaymentError::InvalidState(format!(
                "remittance {remittance_id} has no provider reference"
            )));
        };
        self.provider.check_status(&external_id).await
    }
}

/// One ledger row of a settled remittance. Legs carry the request's key
/// suffixed with `-send` or `-fee`.
fn leg(
    remittance: &Remittance,
    r#type: TransactionType,
    amount: Money,
    (balance_before, balance_after): (Money, Money),
    description: String,
) -> Result<NewTransaction> {
    let suffix = match r#type {
        TransactionType::Fee => "fee",
        _ => "send",
    };
    Ok(NewTransaction {
        wallet_id: remittance.sender_wallet_id,
        owner: remittance.sender_id,
        r#type,
        amount: Amount::try_from(amount)?,
        currency: remittance.from_currency.clone(),
        balance_before,
        balance_after,
        status: TransactionStatus::Completed,
        description,
        reference_id: Some(remittance.id),
        idempotency_key: remittance
            .idempotency_key
            .as_ref()
            .map(|key| format!("{key}-{suffix}")),
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

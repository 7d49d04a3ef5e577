use crate::domain::wallet::Wallet;
use crate::error::{PaymentError, Result};
use serde::Serialize;
use std::io::Write;
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct WalletRow<'a> {
    wallet: Uuid,
    owner: Uuid,
    currency: &'a str,
    balance: String,
    held: String,
    available: String,
    active: bool,
}

impl<'a> From<&'a Wallet> for WalletRow<'a> {
    fn from(wallet: &'a Wallet) -> Self {
        Self {
            wallet: wallet.id,
            owner: wallet.owner,
            currency: wallet.currency.as_str(),
            balance: wallet.balance.to_string(),
            held: wallet.held_balance.to_string(),
            available: wallet.available_balance.to_string(),
            active: wallet.active,
        }
    }
}

/// Writes the wallet table as CSV with a
/// `wallet,owner,currency,balance,held,available,active` header.
pub struct WalletWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> WalletWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_wallets<'a>(&mut self, wallets: impl IntoIterator<Item = &'a Wallet>) -> Result<()> {
        let mut wrote_any = false;
        for wallet in wallets {
            self.writer.serialize(WalletRow::from(wallet))?;
            wrote_any = true;
        }
        if !wrote_any {
            // serde only emits the header alongside the first row
            self.writer.write_record([
                "wallet",
                "owner",
                "currency",
                "balance",
                "held",
                "available",
                "active",
            ])?;
        }
        self.writer.flush().map_err(PaymentError::from)
    }
}

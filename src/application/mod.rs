//! Application layer: the services that orchestrate the domain over the ports.
//!
//! [`engine::RemittanceEngine`] wires the services together. Wallet balances
//! are only ever mutated through [`ledger::WalletLedger`], which serializes
//! work per wallet with [`locks::KeyedLocks`] while unrelated wallets proceed
//! concurrently on the tokio runtime.

pub mod engine;
pub mod idempotency;
pub mod ledger;
pub mod locks;
pub mod quotes;
pub mod remittance;
pub mod transactions;

//! Domain types and the ports the application layer talks through.

pub mod directory;
pub mod idempotency;
pub mod money;
pub mod ports;
pub mod quote;
pub mod remittance;
pub mod transaction;
pub mod wallet;

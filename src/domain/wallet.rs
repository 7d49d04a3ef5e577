use super::money::{Amount, CurrencyCode, Money};
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-owner, per-currency balance record.
///
/// Tracks available funds, held funds (reserved by in-flight remittances), and
/// the total balance. `balance == available_balance + held_balance` holds
/// after every method on this type, successful or not: a failing operation
/// leaves the wallet untouched.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Wallet {
    pub id: Uuid,
    pub owner: Uuid,
    pub currency: CurrencyCode,
    /// Total funds (available + held).
    pub balance: Money,
    /// Funds reserved by holds.
    pub held_balance: Money,
    /// Funds eligible for new holds.
    pub available_balance: Money,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(owner: Uuid, currency: CurrencyCode) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner,
            currency,
            balance: Money::ZERO,
            held_balance: Money::ZERO,
            available_balance: Money::ZERO,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.available_balance
            .checked_add(self.held_balance)
            .is_ok_and(|sum| sum == self.balance)
    }

    /// Credits funds to both the total and the available balance.
    pub fn deposit(&mut self, amount: Amount) -> Result<(), PaymentError> {
        self.ensure_active()?;
        let balance = self.balance.checked_add(amount.money())?;
        let available = self.available_balance.checked_add(amount.money())?;
        self.balance = balance;
        self.available_balance = available;
        self.touch();
        Ok(())
    }

    /// Moves funds from available to held.
    pub fn hold(&mut self, amount: Amount) -> Result<(), PaymentError> {
        self.ensure_active()?;
        if self.available_balance < amount.money() {
            return Err(PaymentError::InsufficientFunds {
                required: amount.money(),
                available: self.available_balance,
            });
        }
        let available = self.available_balance.checked_sub(amount.money())?;
        let held = self.held_balance.checked_add(amount.money())?;
        self.available_balance = available;
        self.held_balance = held;
        self.touch();
        Ok(())
    }

    /// Moves previously held funds back to available.
    pub fn release(&mut self, amount: Amount) -> Result<(), PaymentError> {
        self.ensure_active()?;
        self.ensure_held(amount)?;
        let held = self.held_balance.checked_sub(amount.money())?;
        let available = self.available_balance.checked_add(amount.money())?;
        self.held_balance = held;
        self.available_balance = available;
        self.touch();
        Ok(())
    }

    /// Removes previously held funds from the ledger entirely.
    pub fn deduct(&mut self, amount: Amount) -> Result<(), PaymentError> {
        self.ensure_active()?;
        self.ensure_held(amount)?;
        let held = self.held_balance.checked_sub(amount.money())?;
        let balance = self.balance.checked_sub(amount.money())?;
        self.held_balance = held;
        self.balance = balance;
        self.touch();
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.touch();
    }

    fn ensure_active(&self) -> Result<(), PaymentError> {
        if self.active {
            Ok(())
        } else {
            Err(PaymentError::InvalidState(format!(
                "wallet {} is deactivated",
                self.id
            )))
        }
    }

    fn ensure_held(&self, amount: Amount) -> Result<(), PaymentError> {
        if self.held_balance < amount.money() {
            Err(PaymentError::InvalidState(format!(
                "insufficient held balance on wallet {}: held {}, requested {}",
                self.id, self.held_balance, amount
            )))
        } else {
            Ok(())
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

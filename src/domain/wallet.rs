use crate::domain::money::{Amount, Balance};
use crate::error::WalletError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies an authenticated actor (the verified identity handed to the
/// core by the auth layer).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletId(Uuid);

impl WalletId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Gateway-side customer identifier, created once per wallet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A custodial balance record owned by exactly one actor.
///
/// The balance is only ever mutated through the wallet store, which records a
/// matching ledger entry for every change. The gateway customer id is set at
/// creation and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub id: WalletId,
    pub owner: ActorId,
    pub balance: Balance,
    pub customer_id: CustomerId,
    pub created_at: DateTime<Utc>,
}

impl WalletAccount {
    pub fn new(owner: ActorId, customer_id: CustomerId, initial_balance: Balance) -> Self {
        Self {
            id: WalletId::generate(),
            owner,
            balance: initial_balance,
            customer_id,
            created_at: Utc::now(),
        }
    }

    /// Credits funds to the balance.
    pub fn credit(&mut self, amount: Amount) {
        self.balance += amount;
    }

    /// Debits funds if the balance covers the amount.
    pub fn debit(&mut self, amount: Amount) -> Result<(), WalletError> {
        if self.balance.covers(amount) {
            self.balance -= amount;
            Ok(())
        } else {
            Err(WalletError::InsufficientFunds {
                available: self.balance.value(),
                requested: amount.value(),
            })
        }
    }
}

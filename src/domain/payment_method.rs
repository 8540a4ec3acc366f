use crate::domain::wallet::ActorId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Gateway-side payment method identifier (e.g. a tokenized card).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentMethodId(pub String);

impl PaymentMethodId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentMethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for PaymentMethodId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Display details of a card, as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDetails {
    pub brand: String,
    pub last4: String,
    pub exp_month: u8,
    pub exp_year: u16,
}

/// A payment method registered by an actor, mirrored against the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethodRecord {
    pub owner: ActorId,
    pub method_id: PaymentMethodId,
    pub kind: String,
    pub card: Option<CardDetails>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl PaymentMethodRecord {
    pub fn new(
        owner: ActorId,
        method_id: PaymentMethodId,
        kind: impl Into<String>,
        card: Option<CardDetails>,
    ) -> Self {
        Self {
            owner,
            method_id,
            kind: kind.into(),
            card,
            is_default: false,
            created_at: Utc::now(),
        }
    }
}

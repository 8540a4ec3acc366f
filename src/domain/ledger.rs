use crate::domain::money::Amount;
use crate::domain::wallet::WalletId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Metadata key correlating a QR token with its pending entry.
pub const META_PAYMENT_TOKEN: &str = "payment_token";
/// Metadata key holding the RFC 3339 deadline of a QR token.
pub const META_EXPIRES_AT: &str = "expires_at";
/// Metadata marker claimed by the single finalizer of a pending entry.
pub const META_SETTLING: &str = "settling";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    Deposit,
    Withdraw,
    Transfer,
    QrPayment,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryKind::Deposit => "deposit",
            EntryKind::Withdraw => "withdraw",
            EntryKind::Transfer => "transfer",
            EntryKind::QrPayment => "qr-payment",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Completed,
    Failed,
}

impl EntryStatus {
    /// Status transitions are monotonic: pending entries settle exactly once
    /// and never reopen.
    pub fn can_transition_to(self, next: EntryStatus) -> bool {
        matches!(
            (self, next),
            (EntryStatus::Pending, EntryStatus::Completed)
                | (EntryStatus::Pending, EntryStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self != EntryStatus::Pending
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Completed => "completed",
            EntryStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One immutable record of a money movement.
///
/// After creation only three mutations are allowed, each through the ledger
/// store: a single monotonic status settlement, attaching the source wallet
/// once determined (QR flow), and attaching the gateway reference once the
/// gateway call returns. Entries are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub kind: EntryKind,
    pub amount: Amount,
    pub source: Option<WalletId>,
    pub destination: Option<WalletId>,
    pub status: EntryStatus,
    pub external_ref: Option<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    fn new(
        kind: EntryKind,
        amount: Amount,
        source: Option<WalletId>,
        destination: Option<WalletId>,
        status: EntryStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EntryId::generate(),
            kind,
            amount,
            source,
            destination,
            status,
            external_ref: None,
            metadata: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn pending(
        kind: EntryKind,
        amount: Amount,
        source: Option<WalletId>,
        destination: Option<WalletId>,
    ) -> Self {
        Self::new(kind, amount, source, destination, EntryStatus::Pending)
    }

    pub fn completed(
        kind: EntryKind,
        amount: Amount,
        source: Option<WalletId>,
        destination: Option<WalletId>,
    ) -> Self {
        Self::new(kind, amount, source, destination, EntryStatus::Completed)
    }

    pub fn with_external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Key passed to the gateway so a retried call settles onto the same
    /// gateway-side object.
    pub fn idempotency_key(&self) -> String {
        self.id.to_string()
    }

    pub fn payment_token(&self) -> Option<&str> {
        self.metadata.get(META_PAYMENT_TOKEN)?.as_str()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.metadata.get(META_EXPIRES_AT)?.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn touches(&self, wallet: WalletId) -> bool {
        self.source == Some(wallet) || self.destination == Some(wallet)
    }
}

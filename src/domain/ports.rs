use crate::domain::ledger::{EntryId, EntryStatus, LedgerEntry};
use crate::domain::money::Amount;
use crate::domain::payment_method::{CardDetails, PaymentMethodId, PaymentMethodRecord};
use crate::domain::wallet::{ActorId, CustomerId, WalletAccount, WalletId};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

pub type WalletStoreRef = Arc<dyn WalletStore>;
pub type LedgerStoreRef = Arc<dyn LedgerStore>;
pub type PaymentMethodStoreRef = Arc<dyn PaymentMethodStore>;
pub type GatewayClientRef = Arc<dyn GatewayClient>;
pub type KycGateRef = Arc<dyn KycGate>;
pub type NotificationSinkRef = Arc<dyn NotificationSink>;

/// Owns the wallet records and serializes every balance mutation.
///
/// `credit`, `debit` and `transfer` each run as a single critical section so
/// the balance check and the mutation cannot be interleaved by a concurrent
/// operation. No implementation may hold its internal lock across an await
/// point that leaves the store.
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Persists a new wallet. Fails with `WalletAlreadyExists` if the owner
    /// already has one.
    async fn insert(&self, wallet: WalletAccount) -> Result<()>;

    async fn get(&self, owner: &ActorId) -> Result<Option<WalletAccount>>;

    async fn get_by_id(&self, id: WalletId) -> Result<Option<WalletAccount>>;

    /// Atomically credits the owner's wallet, returning the updated record.
    async fn credit(&self, owner: &ActorId, amount: Amount) -> Result<WalletAccount>;

    /// Atomically checks and debits the owner's wallet. The sufficiency check
    /// and the debit happen inside one critical section.
    async fn debit(&self, owner: &ActorId, amount: Amount) -> Result<WalletAccount>;

    /// Atomically moves `amount` from `source` to `destination`. Either both
    /// balances change or neither does.
    async fn transfer(
        &self,
        source: WalletId,
        destination: WalletId,
        amount: Amount,
    ) -> Result<(WalletAccount, WalletAccount)>;
}

/// Append-mostly store of ledger entries; the audit source of truth.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn append(&self, entry: LedgerEntry) -> Result<LedgerEntry>;

    async fn get(&self, id: EntryId) -> Result<Option<LedgerEntry>>;

    /// Looks up an entry by its gateway reference (unique when present).
    async fn find_by_external_ref(&self, external_ref: &str) -> Result<Option<LedgerEntry>>;

    /// The unique pending entry carrying `token`, if any. Read-only peek;
    /// consuming the token goes through `claim_for_source`.
    async fn find_pending_by_token(&self, token: &str) -> Result<Option<LedgerEntry>>;

    /// Atomic claim step of the QR flow: finds the pending entry carrying
    /// `token`, verifies it has no source attached and has not expired as of
    /// `now`, and attaches `source` — all in one critical section. A second
    /// claim, an unknown token or an expired one yields
    /// `InvalidOrExpiredToken`; an expired entry is marked failed on the way
    /// out.
    async fn claim_for_source(
        &self,
        token: &str,
        source: WalletId,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry>;

    async fn attach_external_ref(&self, id: EntryId, external_ref: &str) -> Result<LedgerEntry>;

    /// Atomically marks a pending entry as under settlement; a second call
    /// for the same entry fails. Guards finalization against two concurrent
    /// confirmations applying the balance movement twice.
    async fn begin_settlement(&self, id: EntryId) -> Result<LedgerEntry>;

    /// Settles a pending entry to a terminal status. Rejects non-monotonic
    /// transitions with `InvalidStatusTransition`.
    async fn settle(&self, id: EntryId, status: EntryStatus) -> Result<LedgerEntry>;

    /// All entries where the wallet is source or destination, newest first.
    async fn for_wallet(&self, wallet: WalletId) -> Result<Vec<LedgerEntry>>;
}

#[async_trait]
pub trait PaymentMethodStore: Send + Sync {
    async fn insert(&self, record: PaymentMethodRecord) -> Result<()>;

    async fn get(
        &self,
        owner: &ActorId,
        method: &PaymentMethodId,
    ) -> Result<Option<PaymentMethodRecord>>;

    /// Whether the method is registered at all, regardless of owner.
    async fn contains(&self, method: &PaymentMethodId) -> Result<bool>;

    /// The owner's methods, newest first.
    async fn list(&self, owner: &ActorId) -> Result<Vec<PaymentMethodRecord>>;

    async fn remove(&self, owner: &ActorId, method: &PaymentMethodId) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresConfirmation,
    Succeeded,
    Failed,
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IntentStatus::RequiresConfirmation => "requires_confirmation",
            IntentStatus::Succeeded => "succeeded",
            IntentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Gateway-side object representing an in-progress charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub status: IntentStatus,
    pub amount_minor: i64,
}

/// Gateway-side object representing money paid out of the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPaymentMethod {
    pub id: PaymentMethodId,
    pub kind: String,
    pub card: Option<CardDetails>,
}

/// Contract over the external card-payment processor. Pure request/response;
/// every call is blocking I/O across the network boundary, so callers must
/// not hold any lock while awaiting these.
///
/// Amounts cross this boundary in minor currency units.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn create_customer(&self, email: &str) -> GatewayResult<CustomerId>;

    /// Idempotent: attaching a method already attached to the same customer
    /// succeeds without side effect; a method attached elsewhere is detached
    /// and reattached.
    async fn attach_payment_method(
        &self,
        method: &PaymentMethodId,
        customer: &CustomerId,
    ) -> GatewayResult<()>;

    async fn retrieve_payment_method(
        &self,
        method: &PaymentMethodId,
    ) -> GatewayResult<GatewayPaymentMethod>;

    /// May report `ResourceMissing` if the method is already gone; callers
    /// that only need the method gone treat that as success.
    async fn detach_payment_method(&self, method: &PaymentMethodId) -> GatewayResult<()>;

    async fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        customer: &CustomerId,
        method: Option<&PaymentMethodId>,
        idempotency_key: &str,
    ) -> GatewayResult<PaymentIntent>;

    async fn confirm_payment_intent(
        &self,
        intent_id: &str,
        method: &PaymentMethodId,
    ) -> GatewayResult<PaymentIntent>;

    async fn create_payout(
        &self,
        amount_minor: i64,
        customer: &CustomerId,
        idempotency_key: &str,
    ) -> GatewayResult<Payout>;
}

/// Answers whether an actor's identity verification is approved.
#[async_trait]
pub trait KycGate: Send + Sync {
    async fn is_approved(&self, actor: &ActorId) -> Result<bool>;
}

/// Outbound notification events, mirroring the money movements.
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    Deposited {
        actor: ActorId,
        amount: Amount,
        entry: EntryId,
    },
    Withdrawn {
        actor: ActorId,
        amount: Amount,
        entry: EntryId,
    },
    Transferred {
        from: ActorId,
        to: ActorId,
        amount: Amount,
        entry: EntryId,
    },
    PaymentMethodAdded {
        actor: ActorId,
        method: PaymentMethodId,
    },
    QrPaymentSent {
        payer: ActorId,
        recipient: ActorId,
        amount: Amount,
        entry: EntryId,
    },
    QrPaymentReceived {
        payer: ActorId,
        recipient: ActorId,
        amount: Amount,
        entry: EntryId,
    },
}

/// Fire-and-forget delivery capability. Has no error channel on purpose: a
/// notification failure must never fail the ledger operation that raised it.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: NotificationEvent);
}

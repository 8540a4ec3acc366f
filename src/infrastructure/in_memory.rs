use crate::domain::ledger::{EntryId, EntryStatus, LedgerEntry, META_SETTLING};
use crate::domain::money::Amount;
use crate::domain::payment_method::{PaymentMethodId, PaymentMethodRecord};
use crate::domain::ports::{LedgerStore, PaymentMethodStore, WalletStore};
use crate::domain::wallet::{ActorId, WalletAccount, WalletId};
use crate::error::{Result, WalletError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread-safe in-memory wallet store.
///
/// A single `RwLock` over the wallet map means every mutating method runs as
/// one critical section: the balance check and the balance change cannot be
/// split by a concurrent writer, and a transfer updates both wallets before
/// anyone else can observe either.
#[derive(Default, Clone)]
pub struct InMemoryWalletStore {
    wallets: Arc<RwLock<HashMap<ActorId, WalletAccount>>>,
}

impl InMemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every wallet, used for final reporting.
    pub async fn all(&self) -> Vec<WalletAccount> {
        self.wallets.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn insert(&self, wallet: WalletAccount) -> Result<()> {
        let mut wallets = self.wallets.write().await;
        if wallets.contains_key(&wallet.owner) {
            return Err(WalletError::WalletAlreadyExists {
                actor: wallet.owner.to_string(),
            });
        }
        wallets.insert(wallet.owner.clone(), wallet);
        Ok(())
    }

    async fn get(&self, owner: &ActorId) -> Result<Option<WalletAccount>> {
        let wallets = self.wallets.read().await;
        Ok(wallets.get(owner).cloned())
    }

    async fn get_by_id(&self, id: WalletId) -> Result<Option<WalletAccount>> {
        let wallets = self.wallets.read().await;
        Ok(wallets.values().find(|w| w.id == id).cloned())
    }

    async fn credit(&self, owner: &ActorId, amount: Amount) -> Result<WalletAccount> {
        let mut wallets = self.wallets.write().await;
        let wallet = wallets
            .get_mut(owner)
            .ok_or_else(|| WalletError::WalletNotFound {
                actor: owner.to_string(),
            })?;
        wallet.credit(amount);
        Ok(wallet.clone())
    }

    async fn debit(&self, owner: &ActorId, amount: Amount) -> Result<WalletAccount> {
        let mut wallets = self.wallets.write().await;
        let wallet = wallets
            .get_mut(owner)
            .ok_or_else(|| WalletError::WalletNotFound {
                actor: owner.to_string(),
            })?;
        wallet.debit(amount)?;
        Ok(wallet.clone())
    }

    async fn transfer(
        &self,
        source: WalletId,
        destination: WalletId,
        amount: Amount,
    ) -> Result<(WalletAccount, WalletAccount)> {
        if source == destination {
            return Err(WalletError::InvalidOperation(
                "cannot transfer a wallet to itself".to_string(),
            ));
        }
        let mut wallets = self.wallets.write().await;
        let mut src = wallets
            .values()
            .find(|w| w.id == source)
            .cloned()
            .ok_or_else(|| WalletError::WalletNotFound {
                actor: source.to_string(),
            })?;
        let mut dst = wallets
            .values()
            .find(|w| w.id == destination)
            .cloned()
            .ok_or_else(|| WalletError::WalletNotFound {
                actor: destination.to_string(),
            })?;

        // Debit first; if it fails nothing has been written back.
        src.debit(amount)?;
        dst.credit(amount);

        wallets.insert(src.owner.clone(), src.clone());
        wallets.insert(dst.owner.clone(), dst.clone());
        Ok((src, dst))
    }
}

/// Thread-safe in-memory ledger. Entries are appended, settled once, and
/// never removed.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    entries: Arc<RwLock<HashMap<EntryId, LedgerEntry>>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry, unordered. Used by tests and reconciliation
    /// tooling.
    pub async fn all(&self) -> Vec<LedgerEntry> {
        self.entries.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(&self, entry: LedgerEntry) -> Result<LedgerEntry> {
        let mut entries = self.entries.write().await;
        if let Some(reference) = entry.external_ref.as_deref()
            && entries
                .values()
                .any(|e| e.external_ref.as_deref() == Some(reference))
        {
            return Err(WalletError::InvalidOperation(format!(
                "external reference {reference} already recorded"
            )));
        }
        entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn get(&self, id: EntryId) -> Result<Option<LedgerEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&id).cloned())
    }

    async fn find_by_external_ref(&self, external_ref: &str) -> Result<Option<LedgerEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .find(|e| e.external_ref.as_deref() == Some(external_ref))
            .cloned())
    }

    async fn find_pending_by_token(&self, token: &str) -> Result<Option<LedgerEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .find(|e| e.status == EntryStatus::Pending && e.payment_token() == Some(token))
            .cloned())
    }

    async fn claim_for_source(
        &self,
        token: &str,
        source: WalletId,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .values_mut()
            .find(|e| e.status == EntryStatus::Pending && e.payment_token() == Some(token))
            .ok_or(WalletError::InvalidOrExpiredToken)?;

        // A token is consumed exactly once.
        if entry.source.is_some() {
            return Err(WalletError::InvalidOrExpiredToken);
        }
        if let Some(deadline) = entry.expires_at()
            && now > deadline
        {
            entry.status = EntryStatus::Failed;
            entry.updated_at = now;
            return Err(WalletError::InvalidOrExpiredToken);
        }

        entry.source = Some(source);
        entry.updated_at = now;
        Ok(entry.clone())
    }

    async fn attach_external_ref(&self, id: EntryId, external_ref: &str) -> Result<LedgerEntry> {
        let mut entries = self.entries.write().await;
        if entries
            .values()
            .any(|e| e.id != id && e.external_ref.as_deref() == Some(external_ref))
        {
            return Err(WalletError::InvalidOperation(format!(
                "external reference {external_ref} already recorded"
            )));
        }
        let entry = entries
            .get_mut(&id)
            .ok_or(WalletError::EntryNotFound { entry: id })?;
        match entry.external_ref.as_deref() {
            None => {
                entry.external_ref = Some(external_ref.to_string());
                entry.updated_at = Utc::now();
                Ok(entry.clone())
            }
            Some(existing) if existing == external_ref => Ok(entry.clone()),
            Some(existing) => Err(WalletError::InvalidOperation(format!(
                "entry {id} already references {existing}"
            ))),
        }
    }

    async fn begin_settlement(&self, id: EntryId) -> Result<LedgerEntry> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&id)
            .ok_or(WalletError::EntryNotFound { entry: id })?;
        if entry.status != EntryStatus::Pending || entry.metadata.contains_key(META_SETTLING) {
            return Err(WalletError::InvalidStatusTransition {
                entry: id,
                from: entry.status,
                to: entry.status,
            });
        }
        entry
            .metadata
            .insert(META_SETTLING.to_string(), serde_json::Value::Bool(true));
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn settle(&self, id: EntryId, status: EntryStatus) -> Result<LedgerEntry> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&id)
            .ok_or(WalletError::EntryNotFound { entry: id })?;
        if !entry.status.can_transition_to(status) {
            return Err(WalletError::InvalidStatusTransition {
                entry: id,
                from: entry.status,
                to: status,
            });
        }
        entry.status = status;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn for_wallet(&self, wallet: WalletId) -> Result<Vec<LedgerEntry>> {
        let entries = self.entries.read().await;
        let mut matching: Vec<LedgerEntry> = entries
            .values()
            .filter(|e| e.touches(wallet))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.to_string().cmp(&a.id.to_string()))
        });
        Ok(matching)
    }
}

/// Thread-safe in-memory payment method store, keyed by the gateway method
/// id (unique across all actors).
#[derive(Default, Clone)]
pub struct InMemoryPaymentMethodStore {
    methods: Arc<RwLock<HashMap<PaymentMethodId, PaymentMethodRecord>>>,
}

impl InMemoryPaymentMethodStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentMethodStore for InMemoryPaymentMethodStore {
    async fn insert(&self, record: PaymentMethodRecord) -> Result<()> {
        let mut methods = self.methods.write().await;
        if methods.contains_key(&record.method_id) {
            return Err(WalletError::InvalidOperation(format!(
                "payment method {} already registered",
                record.method_id
            )));
        }
        methods.insert(record.method_id.clone(), record);
        Ok(())
    }

    async fn get(
        &self,
        owner: &ActorId,
        method: &PaymentMethodId,
    ) -> Result<Option<PaymentMethodRecord>> {
        let methods = self.methods.read().await;
        Ok(methods
            .get(method)
            .filter(|record| &record.owner == owner)
            .cloned())
    }

    async fn contains(&self, method: &PaymentMethodId) -> Result<bool> {
        let methods = self.methods.read().await;
        Ok(methods.contains_key(method))
    }

    async fn list(&self, owner: &ActorId) -> Result<Vec<PaymentMethodRecord>> {
        let methods = self.methods.read().await;
        let mut matching: Vec<PaymentMethodRecord> = methods
            .values()
            .filter(|record| &record.owner == owner)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn remove(&self, owner: &ActorId, method: &PaymentMethodId) -> Result<()> {
        let mut methods = self.methods.write().await;
        match methods.get(method) {
            Some(record) if &record.owner == owner => {
                methods.remove(method);
                Ok(())
            }
            _ => Err(WalletError::PaymentMethodNotFound {
                method: method.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::{EntryKind, META_EXPIRES_AT, META_PAYMENT_TOKEN};
    use crate::domain::money::Balance;
    use crate::domain::wallet::CustomerId;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn wallet(owner: &str, balance: rust_decimal::Decimal) -> WalletAccount {
        WalletAccount::new(
            ActorId::from(owner),
            CustomerId(format!("cus_{owner}")),
            Balance::new(balance),
        )
    }

    fn amount(value: rust_decimal::Decimal) -> Amount {
        Amount::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_wallet_insert_rejects_second_wallet() {
        let store = InMemoryWalletStore::new();
        store.insert(wallet("alice", dec!(0))).await.unwrap();

        let result = store.insert(wallet("alice", dec!(0))).await;
        assert!(matches!(
            result,
            Err(WalletError::WalletAlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_wallet_debit_insufficient_leaves_balance() {
        let store = InMemoryWalletStore::new();
        store.insert(wallet("alice", dec!(10.0))).await.unwrap();

        let result = store.debit(&ActorId::from("alice"), amount(dec!(50.0))).await;
        assert!(matches!(result, Err(WalletError::InsufficientFunds { .. })));

        let alice = store.get(&ActorId::from("alice")).await.unwrap().unwrap();
        assert_eq!(alice.balance, Balance::new(dec!(10.0)));
    }

    #[tokio::test]
    async fn test_wallet_transfer_moves_both_sides() {
        let store = InMemoryWalletStore::new();
        let a = wallet("alice", dec!(100.0));
        let b = wallet("bob", dec!(5.0));
        let (a_id, b_id) = (a.id, b.id);
        store.insert(a).await.unwrap();
        store.insert(b).await.unwrap();

        let (src, dst) = store.transfer(a_id, b_id, amount(dec!(40.0))).await.unwrap();
        assert_eq!(src.balance, Balance::new(dec!(60.0)));
        assert_eq!(dst.balance, Balance::new(dec!(45.0)));
    }

    #[tokio::test]
    async fn test_wallet_transfer_insufficient_touches_neither() {
        let store = InMemoryWalletStore::new();
        let a = wallet("alice", dec!(10.0));
        let b = wallet("bob", dec!(5.0));
        let (a_id, b_id) = (a.id, b.id);
        store.insert(a).await.unwrap();
        store.insert(b).await.unwrap();

        let result = store.transfer(a_id, b_id, amount(dec!(40.0))).await;
        assert!(matches!(result, Err(WalletError::InsufficientFunds { .. })));

        let alice = store.get(&ActorId::from("alice")).await.unwrap().unwrap();
        let bob = store.get(&ActorId::from("bob")).await.unwrap().unwrap();
        assert_eq!(alice.balance, Balance::new(dec!(10.0)));
        assert_eq!(bob.balance, Balance::new(dec!(5.0)));
    }

    #[tokio::test]
    async fn test_wallet_transfer_rejects_self() {
        let store = InMemoryWalletStore::new();
        let a = wallet("alice", dec!(10.0));
        let a_id = a.id;
        store.insert(a).await.unwrap();

        let result = store.transfer(a_id, a_id, amount(dec!(1.0))).await;
        assert!(matches!(result, Err(WalletError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn test_concurrent_debits_never_oversell() {
        let store = Arc::new(InMemoryWalletStore::new());
        store.insert(wallet("alice", dec!(100.0))).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.debit(&ActorId::from("alice"), amount(dec!(10.0))).await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }

        // 100.0 funds only 10 debits of 10.0 each.
        assert_eq!(succeeded, 10);
        let alice = store.get(&ActorId::from("alice")).await.unwrap().unwrap();
        assert_eq!(alice.balance, Balance::ZERO);
    }

    fn qr_entry(token: &str, destination: WalletId, deadline: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry::pending(EntryKind::QrPayment, amount(dec!(25.0)), None, Some(destination))
            .with_metadata(META_PAYMENT_TOKEN, serde_json::json!(token))
            .with_metadata(META_EXPIRES_AT, serde_json::json!(deadline.to_rfc3339()))
    }

    #[tokio::test]
    async fn test_claim_for_source_consumes_token_once() {
        let store = InMemoryLedgerStore::new();
        let recipient = WalletId::generate();
        let payer = WalletId::generate();
        let other_payer = WalletId::generate();
        let deadline = Utc::now() + Duration::minutes(15);
        store.append(qr_entry("tok1", recipient, deadline)).await.unwrap();

        let claimed = store
            .claim_for_source("tok1", payer, Utc::now())
            .await
            .unwrap();
        assert_eq!(claimed.source, Some(payer));

        let second = store.claim_for_source("tok1", other_payer, Utc::now()).await;
        assert!(matches!(second, Err(WalletError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_claim_for_source_expired_token_fails_entry() {
        let store = InMemoryLedgerStore::new();
        let recipient = WalletId::generate();
        let deadline = Utc::now() - Duration::minutes(1);
        let entry = store.append(qr_entry("tok2", recipient, deadline)).await.unwrap();

        let result = store
            .claim_for_source("tok2", WalletId::generate(), Utc::now())
            .await;
        assert!(matches!(result, Err(WalletError::InvalidOrExpiredToken)));

        let stored = store.get(entry.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EntryStatus::Failed);
    }

    #[tokio::test]
    async fn test_claim_for_source_unknown_token() {
        let store = InMemoryLedgerStore::new();
        let result = store
            .claim_for_source("missing", WalletId::generate(), Utc::now())
            .await;
        assert!(matches!(result, Err(WalletError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_settle_enforces_monotonic_status() {
        let store = InMemoryLedgerStore::new();
        let entry = store
            .append(LedgerEntry::pending(
                EntryKind::Deposit,
                amount(dec!(5.0)),
                None,
                Some(WalletId::generate()),
            ))
            .await
            .unwrap();

        store.settle(entry.id, EntryStatus::Completed).await.unwrap();

        let reopen = store.settle(entry.id, EntryStatus::Failed).await;
        assert!(matches!(
            reopen,
            Err(WalletError::InvalidStatusTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_begin_settlement_single_winner() {
        let store = InMemoryLedgerStore::new();
        let entry = store
            .append(LedgerEntry::pending(
                EntryKind::QrPayment,
                amount(dec!(5.0)),
                Some(WalletId::generate()),
                Some(WalletId::generate()),
            ))
            .await
            .unwrap();

        store.begin_settlement(entry.id).await.unwrap();
        let second = store.begin_settlement(entry.id).await;
        assert!(matches!(
            second,
            Err(WalletError::InvalidStatusTransition { .. })
        ));

        // The claimed entry can still settle normally.
        store.settle(entry.id, EntryStatus::Completed).await.unwrap();
    }

    #[tokio::test]
    async fn test_external_ref_unique() {
        let store = InMemoryLedgerStore::new();
        let destination = WalletId::generate();
        store
            .append(
                LedgerEntry::completed(EntryKind::Deposit, amount(dec!(5.0)), None, Some(destination))
                    .with_external_ref("pi_1"),
            )
            .await
            .unwrap();

        let duplicate = store
            .append(
                LedgerEntry::completed(EntryKind::Deposit, amount(dec!(5.0)), None, Some(destination))
                    .with_external_ref("pi_1"),
            )
            .await;
        assert!(matches!(duplicate, Err(WalletError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn test_for_wallet_newest_first() {
        let store = InMemoryLedgerStore::new();
        let wallet_id = WalletId::generate();

        let mut first =
            LedgerEntry::completed(EntryKind::Deposit, amount(dec!(1.0)), None, Some(wallet_id));
        first.created_at = Utc::now() - Duration::seconds(10);
        let mut second =
            LedgerEntry::completed(EntryKind::Deposit, amount(dec!(2.0)), None, Some(wallet_id));
        second.created_at = Utc::now();

        store.append(first.clone()).await.unwrap();
        store.append(second.clone()).await.unwrap();

        let history = store.for_wallet(wallet_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);
    }

    #[tokio::test]
    async fn test_payment_method_ownership() {
        let store = InMemoryPaymentMethodStore::new();
        let record = PaymentMethodRecord::new(
            ActorId::from("alice"),
            PaymentMethodId::from("pm_1"),
            "card",
            None,
        );
        store.insert(record).await.unwrap();

        assert!(store
            .get(&ActorId::from("alice"), &PaymentMethodId::from("pm_1"))
            .await
            .unwrap()
            .is_some());
        // Another actor cannot see or remove it.
        assert!(store
            .get(&ActorId::from("bob"), &PaymentMethodId::from("pm_1"))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .remove(&ActorId::from("bob"), &PaymentMethodId::from("pm_1"))
            .await
            .is_err());
    }
}

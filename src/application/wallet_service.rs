use crate::domain::ledger::{EntryId, EntryKind, EntryStatus, LedgerEntry};
use crate::domain::money::{Amount, Balance};
use crate::domain::payment_method::{PaymentMethodId, PaymentMethodRecord};
use crate::domain::ports::{
    GatewayClient, GatewayClientRef, IntentStatus, KycGate, KycGateRef, LedgerStore,
    LedgerStoreRef, NotificationEvent, NotificationSink, NotificationSinkRef, PaymentMethodStore,
    PaymentMethodStoreRef, WalletStore, WalletStoreRef,
};
use crate::domain::wallet::{ActorId, WalletAccount};
use crate::error::{GatewayError, Result, WalletError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

/// All money crossing the gateway is denominated in this currency.
pub const CURRENCY: &str = "usd";

#[derive(Debug, Clone, Serialize)]
pub struct DepositReceipt {
    pub balance: Balance,
    pub entry: EntryId,
    pub external_ref: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawReceipt {
    pub balance: Balance,
    pub entry: EntryId,
    pub payout_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub entry: EntryId,
    pub from_balance: Balance,
    pub to_balance: Balance,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatus {
    pub status: EntryStatus,
    pub kind: EntryKind,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Orchestrates every wallet operation: the sole balance mutator (together
/// with the QR coordinator, which delegates its finalization here via the
/// shared stores) and the primary caller of the gateway.
///
/// All dependencies arrive as shared port references so tests can substitute
/// fakes.
pub struct WalletService {
    wallets: WalletStoreRef,
    ledger: LedgerStoreRef,
    methods: PaymentMethodStoreRef,
    gateway: GatewayClientRef,
    kyc: KycGateRef,
    notifier: NotificationSinkRef,
}

impl WalletService {
    pub fn new(
        wallets: WalletStoreRef,
        ledger: LedgerStoreRef,
        methods: PaymentMethodStoreRef,
        gateway: GatewayClientRef,
        kyc: KycGateRef,
        notifier: NotificationSinkRef,
    ) -> Self {
        Self {
            wallets,
            ledger,
            methods,
            gateway,
            kyc,
            notifier,
        }
    }

    /// Notification dispatch is fire-and-forget: spawned so neither latency
    /// nor failure of the sink can affect the ledger operation.
    fn dispatch(&self, event: NotificationEvent) {
        let sink = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            sink.notify(event).await;
        });
    }

    async fn wallet_of(&self, actor: &ActorId) -> Result<WalletAccount> {
        self.wallets
            .get(actor)
            .await?
            .ok_or_else(|| WalletError::WalletNotFound {
                actor: actor.to_string(),
            })
    }

    async fn owned_method(
        &self,
        actor: &ActorId,
        method: &PaymentMethodId,
    ) -> Result<PaymentMethodRecord> {
        self.methods
            .get(actor, method)
            .await?
            .ok_or_else(|| WalletError::PaymentMethodNotFound {
                method: method.to_string(),
            })
    }

    /// Maps a gateway failure onto the pending entry. A hard failure settles
    /// the entry as failed; a timeout is indeterminate, so the entry stays
    /// pending and the caller is told to reconcile or retry with the same
    /// idempotency key.
    async fn gateway_failure(&self, entry: EntryId, err: GatewayError) -> WalletError {
        match err {
            GatewayError::Timeout => WalletError::PendingReconciliation { entry },
            other => {
                if let Err(settle_err) = self.ledger.settle(entry, EntryStatus::Failed).await {
                    tracing::error!(%entry, error = %settle_err, "could not mark entry failed");
                }
                WalletError::Gateway(other)
            }
        }
    }

    /// Creates a wallet for a KYC-approved actor without one, registering a
    /// gateway customer. A nonzero opening balance is recorded as a completed
    /// out-of-band deposit entry.
    pub async fn create_wallet(
        &self,
        actor: ActorId,
        email: &str,
        initial_balance: Decimal,
    ) -> Result<WalletAccount> {
        if !self.kyc.is_approved(&actor).await? {
            return Err(WalletError::KycNotApproved {
                actor: actor.to_string(),
            });
        }
        if self.wallets.get(&actor).await?.is_some() {
            return Err(WalletError::WalletAlreadyExists {
                actor: actor.to_string(),
            });
        }
        if initial_balance < Decimal::ZERO {
            return Err(WalletError::NonPositiveAmount {
                amount: initial_balance,
            });
        }

        let customer_id = self.gateway.create_customer(email).await?;
        let wallet = WalletAccount::new(actor.clone(), customer_id, Balance::new(initial_balance));
        self.wallets.insert(wallet.clone()).await?;

        if initial_balance > Decimal::ZERO {
            let amount = Amount::new(initial_balance)?;
            let entry = self
                .ledger
                .append(LedgerEntry::completed(
                    EntryKind::Deposit,
                    amount,
                    None,
                    Some(wallet.id),
                ))
                .await?;
            self.dispatch(NotificationEvent::Deposited {
                actor: actor.clone(),
                amount,
                entry: entry.id,
            });
        }

        tracing::info!(%actor, wallet = %wallet.id, %initial_balance, "wallet created");
        Ok(wallet)
    }

    /// Funds the wallet from a registered card via the gateway.
    ///
    /// A pending entry is recorded first; only a gateway-confirmed success
    /// credits the balance and completes it.
    pub async fn deposit(
        &self,
        actor: &ActorId,
        amount: Amount,
        method: &PaymentMethodId,
    ) -> Result<DepositReceipt> {
        let wallet = self.wallet_of(actor).await?;
        self.owned_method(actor, method).await?;

        let entry = self
            .ledger
            .append(LedgerEntry::pending(
                EntryKind::Deposit,
                amount,
                None,
                Some(wallet.id),
            ))
            .await?;

        self.settle_deposit(&wallet, entry, method).await
    }

    /// Retries a deposit whose gateway outcome was indeterminate. The
    /// pending entry's id doubles as the gateway idempotency key, so the
    /// retry settles onto the same gateway-side intent; an entry that
    /// already completed is returned as-is without a second credit.
    pub async fn retry_deposit(
        &self,
        actor: &ActorId,
        entry_id: EntryId,
        method: &PaymentMethodId,
    ) -> Result<DepositReceipt> {
        let wallet = self.wallet_of(actor).await?;
        self.owned_method(actor, method).await?;

        let entry = self
            .ledger
            .get(entry_id)
            .await?
            .ok_or(WalletError::EntryNotFound { entry: entry_id })?;
        if entry.kind != EntryKind::Deposit || entry.destination != Some(wallet.id) {
            return Err(WalletError::EntryNotFound { entry: entry_id });
        }
        match entry.status {
            EntryStatus::Completed => {
                let external_ref =
                    entry
                        .external_ref
                        .clone()
                        .ok_or(WalletError::TransactionNotFound {
                            reference: entry_id.to_string(),
                        })?;
                return Ok(DepositReceipt {
                    balance: wallet.balance,
                    entry: entry.id,
                    external_ref,
                });
            }
            EntryStatus::Failed => {
                return Err(WalletError::DepositNotSucceeded {
                    intent: entry.external_ref.clone().unwrap_or_default(),
                    status: entry.status.to_string(),
                });
            }
            EntryStatus::Pending => {}
        }

        self.settle_deposit(&wallet, entry, method).await
    }

    async fn settle_deposit(
        &self,
        wallet: &WalletAccount,
        entry: LedgerEntry,
        method: &PaymentMethodId,
    ) -> Result<DepositReceipt> {
        let minor = entry.amount.to_minor_units()?;

        // Gateway calls happen with no lock held; local state is applied only
        // after the returned status is known.
        let intent = match self
            .gateway
            .create_payment_intent(
                minor,
                CURRENCY,
                &wallet.customer_id,
                Some(method),
                &entry.idempotency_key(),
            )
            .await
        {
            Ok(intent) => intent,
            Err(err) => return Err(self.gateway_failure(entry.id, err).await),
        };

        let entry = self.ledger.attach_external_ref(entry.id, &intent.id).await?;

        let confirmed = match self.gateway.confirm_payment_intent(&intent.id, method).await {
            Ok(confirmed) => confirmed,
            Err(err) => return Err(self.gateway_failure(entry.id, err).await),
        };

        if confirmed.status != IntentStatus::Succeeded {
            self.ledger.settle(entry.id, EntryStatus::Failed).await?;
            return Err(WalletError::DepositNotSucceeded {
                intent: confirmed.id,
                status: confirmed.status.to_string(),
            });
        }

        // Settling is the claim step: of two racing retries only the one
        // that completes the entry goes on to credit the balance.
        let entry = match self.ledger.settle(entry.id, EntryStatus::Completed).await {
            Ok(entry) => entry,
            Err(WalletError::InvalidStatusTransition { .. }) => {
                let wallet = self.wallet_of(&wallet.owner).await?;
                return Ok(DepositReceipt {
                    balance: wallet.balance,
                    entry: entry.id,
                    external_ref: intent.id,
                });
            }
            Err(err) => return Err(err),
        };

        let credited = self.wallets.credit(&wallet.owner, entry.amount).await?;

        tracing::info!(
            actor = %wallet.owner,
            entry = %entry.id,
            amount = %entry.amount,
            intent = %confirmed.id,
            "deposit completed"
        );
        self.dispatch(NotificationEvent::Deposited {
            actor: wallet.owner.clone(),
            amount: entry.amount,
            entry: entry.id,
        });

        Ok(DepositReceipt {
            balance: credited.balance,
            entry: entry.id,
            external_ref: confirmed.id,
        })
    }

    /// Pays funds out of the wallet through the gateway, then debits the
    /// balance. An insufficient balance is rejected before any entry or
    /// gateway call is made.
    pub async fn withdraw(&self, actor: &ActorId, amount: Amount) -> Result<WithdrawReceipt> {
        let wallet = self.wallet_of(actor).await?;
        if !wallet.balance.covers(amount) {
            return Err(WalletError::InsufficientFunds {
                available: wallet.balance.value(),
                requested: amount.value(),
            });
        }

        let entry = self
            .ledger
            .append(LedgerEntry::pending(
                EntryKind::Withdraw,
                amount,
                Some(wallet.id),
                None,
            ))
            .await?;

        let minor = amount.to_minor_units()?;
        let payout = match self
            .gateway
            .create_payout(minor, &wallet.customer_id, &entry.idempotency_key())
            .await
        {
            Ok(payout) => payout,
            Err(err) => return Err(self.gateway_failure(entry.id, err).await),
        };

        let entry = self.ledger.attach_external_ref(entry.id, &payout.id).await?;

        // Re-validate after the unlocked gateway call: a concurrent debit may
        // have drained the balance while the payout was in flight.
        let debited = match self.wallets.debit(actor, amount).await {
            Ok(debited) => debited,
            Err(err) => {
                tracing::error!(
                    %actor,
                    entry = %entry.id,
                    payout = %payout.id,
                    "payout issued but balance no longer covers it; entry marked failed for reconciliation"
                );
                self.ledger.settle(entry.id, EntryStatus::Failed).await?;
                return Err(err);
            }
        };
        let entry = self.ledger.settle(entry.id, EntryStatus::Completed).await?;

        tracing::info!(%actor, entry = %entry.id, %amount, payout = %payout.id, "withdrawal completed");
        self.dispatch(NotificationEvent::Withdrawn {
            actor: actor.clone(),
            amount,
            entry: entry.id,
        });

        Ok(WithdrawReceipt {
            balance: debited.balance,
            entry: entry.id,
            payout_id: payout.id,
        })
    }

    /// Moves funds between two local wallets. Both balance changes happen in
    /// one store-level critical section; no gateway is involved.
    pub async fn transfer(
        &self,
        from: &ActorId,
        to: &ActorId,
        amount: Amount,
    ) -> Result<TransferReceipt> {
        let from_wallet = self.wallet_of(from).await?;
        let to_wallet = self.wallet_of(to).await?;

        let (debited, credited) = self
            .wallets
            .transfer(from_wallet.id, to_wallet.id, amount)
            .await?;

        let entry = self
            .ledger
            .append(LedgerEntry::completed(
                EntryKind::Transfer,
                amount,
                Some(from_wallet.id),
                Some(to_wallet.id),
            ))
            .await?;

        tracing::info!(%from, %to, %amount, entry = %entry.id, "transfer completed");
        self.dispatch(NotificationEvent::Transferred {
            from: from.clone(),
            to: to.clone(),
            amount,
            entry: entry.id,
        });

        Ok(TransferReceipt {
            entry: entry.id,
            from_balance: debited.balance,
            to_balance: credited.balance,
        })
    }

    pub async fn get_balance(&self, actor: &ActorId) -> Result<Balance> {
        Ok(self.wallet_of(actor).await?.balance)
    }

    /// All ledger entries touching the actor's wallet, newest first.
    pub async fn get_transactions(&self, actor: &ActorId) -> Result<Vec<LedgerEntry>> {
        let wallet = self.wallet_of(actor).await?;
        self.ledger.for_wallet(wallet.id).await
    }

    /// Status of a movement by its gateway reference, restricted to entries
    /// the actor's wallet participates in.
    pub async fn get_payment_status(
        &self,
        actor: &ActorId,
        external_ref: &str,
    ) -> Result<PaymentStatus> {
        let wallet = self.wallet_of(actor).await?;
        let entry = self
            .ledger
            .find_by_external_ref(external_ref)
            .await?
            .filter(|entry| entry.touches(wallet.id))
            .ok_or_else(|| WalletError::TransactionNotFound {
                reference: external_ref.to_string(),
            })?;

        Ok(PaymentStatus {
            status: entry.status,
            kind: entry.kind,
            amount: entry.amount,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        })
    }

    /// Registers a payment method: retrieves its display details from the
    /// gateway, attaches it to the wallet's customer and stores the record.
    /// Re-adding a method the actor already owns is a no-op success.
    pub async fn add_payment_method(
        &self,
        actor: &ActorId,
        method: &PaymentMethodId,
    ) -> Result<PaymentMethodRecord> {
        let wallet = self.wallet_of(actor).await?;

        if self.methods.contains(method).await? {
            return match self.methods.get(actor, method).await? {
                Some(existing) => Ok(existing),
                None => Err(WalletError::InvalidOperation(format!(
                    "payment method {method} is registered to another actor"
                ))),
            };
        }

        let details = self.gateway.retrieve_payment_method(method).await?;
        self.gateway
            .attach_payment_method(method, &wallet.customer_id)
            .await?;

        let record =
            PaymentMethodRecord::new(actor.clone(), method.clone(), details.kind, details.card);
        self.methods.insert(record.clone()).await?;

        tracing::info!(%actor, %method, "payment method added");
        self.dispatch(NotificationEvent::PaymentMethodAdded {
            actor: actor.clone(),
            method: method.clone(),
        });
        Ok(record)
    }

    pub async fn list_payment_methods(&self, actor: &ActorId) -> Result<Vec<PaymentMethodRecord>> {
        self.methods.list(actor).await
    }

    /// Detaches the method at the gateway and removes the local record. The
    /// gateway reporting the method already gone counts as success.
    pub async fn delete_payment_method(
        &self,
        actor: &ActorId,
        method: &PaymentMethodId,
    ) -> Result<()> {
        self.wallet_of(actor).await?;
        self.owned_method(actor, method).await?;

        match self.gateway.detach_payment_method(method).await {
            Ok(()) => {}
            Err(GatewayError::ResourceMissing { .. }) => {
                tracing::warn!(%method, "method already absent at gateway; removing locally");
            }
            Err(err) => return Err(err.into()),
        }

        self.methods.remove(actor, method).await?;
        tracing::info!(%actor, %method, "payment method deleted");
        Ok(())
    }
}

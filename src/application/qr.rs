use crate::application::wallet_service::CURRENCY;
use crate::domain::ledger::{
    EntryId, EntryKind, EntryStatus, LedgerEntry, META_EXPIRES_AT, META_PAYMENT_TOKEN,
};
use crate::domain::money::{Amount, Balance};
use crate::domain::payment_method::PaymentMethodId;
use crate::domain::ports::{
    GatewayClient, GatewayClientRef, IntentStatus, LedgerStore, LedgerStoreRef, NotificationEvent,
    NotificationSink, NotificationSinkRef, PaymentMethodStore, PaymentMethodStoreRef, WalletStore,
    WalletStoreRef,
};
use crate::domain::wallet::ActorId;
use crate::error::{GatewayError, Result, WalletError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{Duration, Utc};
use rand::RngCore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default lifetime of a generated payment token.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 15;

/// The data encoded into the scannable code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrPayload {
    pub token: String,
    pub amount: Decimal,
    pub recipient: ActorId,
}

#[derive(Debug, Clone, Serialize)]
pub struct QrCode {
    pub token: String,
    pub payload: String,
    pub entry: EntryId,
}

#[derive(Debug, Clone, Serialize)]
pub struct QrInitiation {
    pub client_secret: String,
    pub intent_id: String,
    pub amount: Amount,
    pub status: IntentStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct QrConfirmation {
    pub entry: EntryId,
    pub intent_id: String,
    pub payer_balance: Balance,
}

fn mint_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Decodes a payload produced by [`QrPaymentCoordinator::generate`].
pub fn decode_payload(payload: &str) -> Result<QrPayload> {
    let raw = BASE64
        .decode(payload)
        .map_err(|e| WalletError::InvalidOperation(format!("malformed QR payload: {e}")))?;
    serde_json::from_slice(&raw)
        .map_err(|e| WalletError::InvalidOperation(format!("malformed QR payload: {e}")))
}

/// Two-party, three-step payment flow initiated by scanning a generated
/// code.
///
/// The payer is unknown at generation time, so the flow is a state machine
/// carried by a pending `QrPayment` ledger entry: generated (no source),
/// initiated (source claimed, gateway intent attached), confirmed (entry
/// completed, balances moved). A token is consumed by initiation exactly
/// once and expires after the configured TTL.
pub struct QrPaymentCoordinator {
    wallets: WalletStoreRef,
    ledger: LedgerStoreRef,
    methods: PaymentMethodStoreRef,
    gateway: GatewayClientRef,
    notifier: NotificationSinkRef,
    token_ttl: Duration,
}

impl QrPaymentCoordinator {
    pub fn new(
        wallets: WalletStoreRef,
        ledger: LedgerStoreRef,
        methods: PaymentMethodStoreRef,
        gateway: GatewayClientRef,
        notifier: NotificationSinkRef,
    ) -> Self {
        Self::with_token_ttl(
            wallets,
            ledger,
            methods,
            gateway,
            notifier,
            Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
        )
    }

    pub fn with_token_ttl(
        wallets: WalletStoreRef,
        ledger: LedgerStoreRef,
        methods: PaymentMethodStoreRef,
        gateway: GatewayClientRef,
        notifier: NotificationSinkRef,
        token_ttl: Duration,
    ) -> Self {
        Self {
            wallets,
            ledger,
            methods,
            gateway,
            notifier,
            token_ttl,
        }
    }

    fn dispatch(&self, event: NotificationEvent) {
        let sink = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            sink.notify(event).await;
        });
    }

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

    /// Step one: the recipient publishes an amount. Mints an unguessable
    /// token, records the pending entry and returns the encoded payload.
    pub async fn generate(&self, recipient: &ActorId, amount: Amount) -> Result<QrCode> {
        let wallet = self
            .wallets
            .get(recipient)
            .await?
            .ok_or_else(|| WalletError::WalletNotFound {
                actor: recipient.to_string(),
            })?;

        let token = mint_token();
        let deadline = Utc::now() + self.token_ttl;
        let entry = self
            .ledger
            .append(
                LedgerEntry::pending(EntryKind::QrPayment, amount, None, Some(wallet.id))
                    .with_metadata(META_PAYMENT_TOKEN, serde_json::json!(token))
                    .with_metadata(META_EXPIRES_AT, serde_json::json!(deadline.to_rfc3339())),
            )
            .await?;

        let payload = QrPayload {
            token: token.clone(),
            amount: amount.value(),
            recipient: recipient.clone(),
        };
        let encoded = BASE64.encode(serde_json::to_vec(&payload).map_err(|e| {
            WalletError::InvalidOperation(format!("could not encode QR payload: {e}"))
        })?);

        tracing::info!(%recipient, entry = %entry.id, %amount, "qr payment generated");
        Ok(QrCode {
            token,
            payload: encoded,
            entry: entry.id,
        })
    }

    /// Step two: a payer scans the code. Claims the token (exactly once),
    /// then creates the gateway intent against the payer's customer.
    pub async fn initiate(
        &self,
        token: &str,
        payer: &ActorId,
        method: &PaymentMethodId,
    ) -> Result<QrInitiation> {
        let payer_wallet = self
            .wallets
            .get(payer)
            .await?
            .ok_or_else(|| WalletError::WalletNotFound {
                actor: payer.to_string(),
            })?;
        self.methods
            .get(payer, method)
            .await?
            .ok_or_else(|| WalletError::PaymentMethodNotFound {
                method: method.to_string(),
            })?;

        // Peek before claiming so an underfunded payer does not burn the
        // token.
        let pending = self
            .ledger
            .find_pending_by_token(token)
            .await?
            .ok_or(WalletError::InvalidOrExpiredToken)?;
        if !payer_wallet.balance.covers(pending.amount) {
            return Err(WalletError::InsufficientFunds {
                available: payer_wallet.balance.value(),
                requested: pending.amount.value(),
            });
        }

        let entry = self
            .ledger
            .claim_for_source(token, payer_wallet.id, Utc::now())
            .await?;

        let minor = entry.amount.to_minor_units()?;
        let intent = match self
            .gateway
            .create_payment_intent(
                minor,
                CURRENCY,
                &payer_wallet.customer_id,
                Some(method),
                &entry.idempotency_key(),
            )
            .await
        {
            Ok(intent) => intent,
            Err(err) => return Err(self.gateway_failure(entry.id, err).await),
        };

        let entry = self.ledger.attach_external_ref(entry.id, &intent.id).await?;

        tracing::info!(%payer, entry = %entry.id, intent = %intent.id, "qr payment initiated");
        Ok(QrInitiation {
            client_secret: intent.client_secret,
            intent_id: intent.id,
            amount: entry.amount,
            status: intent.status,
        })
    }

    /// Step three: the payer's client finished; confirm with the gateway and
    /// finalize. Only gateway success moves money: the recipient is credited
    /// and the payer debited in one atomic transfer, then the entry
    /// completes.
    pub async fn confirm(
        &self,
        payer: &ActorId,
        intent_id: &str,
        method: &PaymentMethodId,
    ) -> Result<QrConfirmation> {
        self.methods
            .get(payer, method)
            .await?
            .ok_or_else(|| WalletError::PaymentMethodNotFound {
                method: method.to_string(),
            })?;

        let entry = self
            .ledger
            .find_by_external_ref(intent_id)
            .await?
            .filter(|e| e.kind == EntryKind::QrPayment)
            .ok_or_else(|| WalletError::TransactionNotFound {
                reference: intent_id.to_string(),
            })?;

        match entry.status {
            EntryStatus::Pending => {}
            // Re-confirming a settled payment is idempotent.
            EntryStatus::Completed => {
                let payer_wallet = self.wallets.get(payer).await?.ok_or_else(|| {
                    WalletError::WalletNotFound {
                        actor: payer.to_string(),
                    }
                })?;
                return Ok(QrConfirmation {
                    entry: entry.id,
                    intent_id: intent_id.to_string(),
                    payer_balance: payer_wallet.balance,
                });
            }
            EntryStatus::Failed => {
                return Err(WalletError::PaymentNotSucceeded {
                    intent: intent_id.to_string(),
                    status: entry.status.to_string(),
                });
            }
        }

        let source = entry
            .source
            .ok_or(WalletError::InvalidOrExpiredToken)?;
        let destination = entry
            .destination
            .ok_or_else(|| WalletError::TransactionNotFound {
                reference: intent_id.to_string(),
            })?;

        let confirmed = match self.gateway.confirm_payment_intent(intent_id, method).await {
            Ok(confirmed) => confirmed,
            Err(err) => return Err(self.gateway_failure(entry.id, err).await),
        };
        if confirmed.status != IntentStatus::Succeeded {
            self.ledger.settle(entry.id, EntryStatus::Failed).await?;
            return Err(WalletError::PaymentNotSucceeded {
                intent: intent_id.to_string(),
                status: confirmed.status.to_string(),
            });
        }

        // Single-winner claim so two racing confirmations cannot both apply
        // the balance movement.
        let entry = match self.ledger.begin_settlement(entry.id).await {
            Ok(entry) => entry,
            Err(WalletError::InvalidStatusTransition { .. }) => {
                let payer_wallet = self.wallets.get(payer).await?.ok_or_else(|| {
                    WalletError::WalletNotFound {
                        actor: payer.to_string(),
                    }
                })?;
                return Ok(QrConfirmation {
                    entry: entry.id,
                    intent_id: intent_id.to_string(),
                    payer_balance: payer_wallet.balance,
                });
            }
            Err(err) => return Err(err),
        };

        // Re-validate funds after the unlocked gateway call; the transfer is
        // the atomic check-and-move.
        let (debited, credited) = match self
            .wallets
            .transfer(source, destination, entry.amount)
            .await
        {
            Ok(pair) => pair,
            Err(err) => {
                self.ledger.settle(entry.id, EntryStatus::Failed).await?;
                return Err(err);
            }
        };
        let entry = self.ledger.settle(entry.id, EntryStatus::Completed).await?;

        tracing::info!(
            %payer,
            recipient = %credited.owner,
            entry = %entry.id,
            amount = %entry.amount,
            "qr payment completed"
        );
        self.dispatch(NotificationEvent::QrPaymentSent {
            payer: debited.owner.clone(),
            recipient: credited.owner.clone(),
            amount: entry.amount,
            entry: entry.id,
        });
        self.dispatch(NotificationEvent::QrPaymentReceived {
            payer: debited.owner,
            recipient: credited.owner,
            amount: entry.amount,
            entry: entry.id,
        });

        Ok(QrConfirmation {
            entry: entry.id,
            intent_id: intent_id.to_string(),
            payer_balance: debited.balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_unguessable_hex() {
        let token = mint_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, mint_token());
    }

    #[test]
    fn test_payload_round_trip() {
        let payload = QrPayload {
            token: "abc123".to_string(),
            amount: rust_decimal_macros::dec!(25.00),
            recipient: ActorId::from("bob"),
        };
        let encoded = BASE64.encode(serde_json::to_vec(&payload).unwrap());
        let decoded = decode_payload(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_payload("not base64 at all!").is_err());
        let encoded = BASE64.encode(b"{\"not\": \"a payload\"}");
        assert!(decode_payload(&encoded).is_err());
    }
}

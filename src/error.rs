use crate::domain::ledger::{EntryId, EntryStatus};
use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WalletError>;

/// Failures reported by the external card-payment gateway.
///
/// Kept separate from [`WalletError`] so callers can distinguish a gateway
/// decline (retryable with the same idempotent payload) from an
/// application-level precondition failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    #[error("gateway declined the request: {message}")]
    Declined { message: String },
    #[error("gateway resource {id} does not exist")]
    ResourceMissing { id: String },
    #[error("gateway request timed out")]
    Timeout,
    #[error("gateway unreachable: {message}")]
    Unavailable { message: String },
}

/// All failures the wallet core can surface to its callers.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("KYC verification is not approved for actor {actor}; cannot create wallet")]
    KycNotApproved { actor: String },
    #[error("actor {actor} already has a wallet")]
    WalletAlreadyExists { actor: String },
    #[error("wallet not found for actor {actor}")]
    WalletNotFound { actor: String },
    #[error("payment method {method} not found or does not belong to this actor")]
    PaymentMethodNotFound { method: String },
    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },
    #[error("deposit not succeeded: intent {intent} reported status {status}")]
    DepositNotSucceeded { intent: String, status: String },
    #[error("payment not succeeded: intent {intent} reported status {status}")]
    PaymentNotSucceeded { intent: String, status: String },
    #[error("payment token is invalid or has expired")]
    InvalidOrExpiredToken,
    #[error("no transaction found for reference {reference}")]
    TransactionNotFound { reference: String },
    /// The gateway outcome is indeterminate (timeout). The pending ledger
    /// entry carries the idempotency key for a later retry or operator
    /// reconciliation; it is intentionally not marked failed.
    #[error("gateway outcome unknown; ledger entry {entry} left pending for reconciliation")]
    PendingReconciliation { entry: EntryId },
    #[error("amount must be positive, got {amount}")]
    NonPositiveAmount { amount: Decimal },
    #[error("amount {amount} cannot be represented exactly in minor currency units")]
    InexactMinorUnits { amount: Decimal },
    #[error("ledger entry {entry} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        entry: EntryId,
        from: EntryStatus,
        to: EntryStatus,
    },
    #[error("ledger entry not found: {entry}")]
    EntryNotFound { entry: EntryId },
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

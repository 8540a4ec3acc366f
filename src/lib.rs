//! Custodial wallet ledger and payment-orchestration core.
//!
//! Mutates wallet balances, keeps an immutable transaction ledger, and
//! coordinates multi-step card-gateway interactions: deposits, payouts,
//! internal transfers and a two-party QR payment flow. HTTP routing, auth
//! and real notification delivery live outside; they reach this crate
//! through the ports in [`domain::ports`].

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;

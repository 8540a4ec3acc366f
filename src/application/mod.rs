//! Application layer: the wallet ledger service and the QR payment
//! coordinator, orchestrating the domain ports.

pub mod qr;
pub mod wallet_service;

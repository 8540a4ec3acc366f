//! Adapters behind the domain ports: in-memory stores, the KYC gate, the
//! simulated gateway and the notification sinks.

pub mod gateway;
pub mod in_memory;
pub mod kyc;
pub mod notify;

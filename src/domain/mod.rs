//! Domain model: value objects, wallet and ledger records, and the ports
//! the application layer depends on.

pub mod ledger;
pub mod money;
pub mod payment_method;
pub mod ports;
pub mod wallet;

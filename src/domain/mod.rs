//! Domain layer: ledger records, the deal lifecycle and the storage ports.

pub mod account;
pub mod actor;
pub mod blacklist;
pub mod deal;
pub mod ports;

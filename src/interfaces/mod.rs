//! Adapters that drive the escrow core from the outside.

pub mod csv;

//! Application layer: the ledger and chain engines.
//!
//! `LedgerEngine` enforces the monetary invariants over the transaction log;
//! `ChainEngine` seals batches of those transactions into a proof-of-work
//! hash chain. Both are owned instances injected with their stores.

pub mod chain;
pub mod ledger;

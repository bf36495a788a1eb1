//! Coin balances derived from an append-only ledger, sealed into a
//! proof-of-work hash chain.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;

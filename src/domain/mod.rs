//! Domain layer: value types, block hashing and the storage ports the
//! engines depend on.

pub mod block;
pub mod money;
pub mod ports;
pub mod transaction;
pub mod user;

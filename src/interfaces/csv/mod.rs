//! CSV codecs for batch imports and ledger exports.

pub mod ledger_writer;
pub mod operation_reader;

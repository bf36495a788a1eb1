#![allow(dead_code)]

use karmakoin::application::chain::ChainEngine;
use karmakoin::application::ledger::LedgerEngine;
use karmakoin::config::EngineConfig;
use karmakoin::infrastructure::in_memory::{
    InMemoryChainStore, InMemoryTransactionLog, InMemoryUserRegistry,
};
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;

/// Cheap proof-of-work so sealing in tests stays fast.
pub const TEST_DIFFICULTY: u8 = 2;

pub fn test_config() -> EngineConfig {
    EngineConfig::default().with_difficulty(TEST_DIFFICULTY)
}

/// In-memory ledger wired to an in-memory chain, with `users` registered.
pub async fn engines(users: &[&str]) -> (LedgerEngine, Arc<ChainEngine>) {
    let chain = Arc::new(
        ChainEngine::open(Box::new(InMemoryChainStore::new()), &test_config())
            .await
            .unwrap(),
    );
    let ledger = LedgerEngine::open(
        Box::new(InMemoryUserRegistry::new()),
        Box::new(InMemoryTransactionLog::new()),
    )
    .await
    .unwrap()
    .with_chain(chain.clone());

    for user in users {
        ledger.create_wallet(&(*user).into()).await.unwrap();
    }
    (ledger, chain)
}

/// Writes an import file: one mint of `rows` coins to `user1`, then
/// `rows - 1` single-coin transfers to `user2`.
pub fn generate_operations_csv(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["type", "from", "to", "amount", "description"])?;
    wtr.write_record(["mint", "", "user1", &rows.to_string(), "seed"])?;
    for i in 1..rows {
        wtr.write_record([
            "transfer",
            "user1",
            "user2",
            "1",
            &format!("payment {i}"),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

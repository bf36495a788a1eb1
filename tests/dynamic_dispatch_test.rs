use karmakoin::domain::block::{Block, Difficulty};
use karmakoin::domain::money::Amount;
use karmakoin::domain::ports::{ChainStoreBox, TransactionLogBox, UserRegistryBox};
use karmakoin::domain::transaction::Transaction;
use karmakoin::domain::user::UserId;
use karmakoin::infrastructure::file::JsonFileStore;
use karmakoin::infrastructure::in_memory::{
    InMemoryChainStore, InMemoryTransactionLog, InMemoryUserRegistry,
};
use rust_decimal_macros::dec;

async fn exercise(users: UserRegistryBox, log: TransactionLogBox, chain: ChainStoreBox) {
    let tx = Transaction::new(
        UserId::system(),
        "alice".into(),
        Amount::new(dec!(100)).unwrap(),
        "seed",
        1,
    );
    let genesis = Block::genesis(1, Difficulty::new(1));

    // Verify Send + Sync by spawning tasks
    let users_handle = tokio::spawn(async move {
        users.register(&"alice".into()).await.unwrap();
        users.exists(&"alice".into()).await.unwrap()
    });
    let log_handle = tokio::spawn(async move {
        log.append_transaction(&tx).await.unwrap();
        log.list_transactions().await.unwrap()
    });
    let chain_handle = tokio::spawn(async move {
        chain
            .save_chain(std::slice::from_ref(&genesis))
            .await
            .unwrap();
        chain.load_chain().await.unwrap()
    });

    assert!(users_handle.await.unwrap());
    assert_eq!(log_handle.await.unwrap().len(), 1);
    assert_eq!(chain_handle.await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_in_memory_stores_as_trait_objects() {
    exercise(
        Box::new(InMemoryUserRegistry::new()),
        Box::new(InMemoryTransactionLog::new()),
        Box::new(InMemoryChainStore::new()),
    )
    .await;
}

#[tokio::test]
async fn test_file_store_as_trait_objects() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path()).unwrap();
    exercise(
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store),
    )
    .await;
}

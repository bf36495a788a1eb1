use super::chain::ChainEngine;
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::{TransactionLogBox, UserRegistryBox};
use crate::domain::transaction::{Transaction, derive_balance, now_millis};
use crate::domain::user::UserId;
use crate::error::{CoinError, Result};
use log::info;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Result of a successful mint.
#[derive(Debug, Clone, PartialEq)]
pub struct MintReceipt {
    pub transaction: Transaction,
    pub new_balance: Balance,
}

/// Result of a successful transfer, with both balances after the move.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub transaction: Transaction,
    pub from_balance: Balance,
    pub to_balance: Balance,
}

/// Validates and records mints and transfers, and derives balances.
///
/// The engine owns an in-memory replay of the transaction log. Every
/// mutation takes the history write lock for its whole
/// validate → persist → commit sequence, so balance checks never race.
/// A failed append leaves the replay untouched.
pub struct LedgerEngine {
    users: UserRegistryBox,
    log: TransactionLogBox,
    history: RwLock<Vec<Transaction>>,
    chain: Option<Arc<ChainEngine>>,
}

impl LedgerEngine {
    /// Creates a `LedgerEngine` over the given registry and log, replaying
    /// whatever the log already holds.
    ///
    /// # Arguments
    ///
    /// * `users` - The registry of known identities.
    /// * `log` - The persistent, append-only transaction log.
    pub async fn open(users: UserRegistryBox, log: TransactionLogBox) -> Result<Self> {
        let history = log.list_transactions().await?;
        info!("replayed {} ledger transaction(s)", history.len());
        Ok(Self {
            users,
            log,
            history: RwLock::new(history),
            chain: None,
        })
    }

    /// Forwards every committed transaction to `chain`'s pending pool.
    pub fn with_chain(mut self, chain: Arc<ChainEngine>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Ensures `user_id` is registered. A no-op for known identities.
    pub async fn create_wallet(&self, user_id: &UserId) -> Result<()> {
        if user_id.is_system() {
            return Err(CoinError::ReservedIdentity(user_id.clone()));
        }
        if !self.users.exists(user_id).await? {
            self.users.register(user_id).await?;
            info!("registered wallet for {user_id}");
        }
        Ok(())
    }

    /// Credits `amount` of new supply to `to`.
    pub async fn mint(
        &self,
        to: &UserId,
        amount: Decimal,
        description: &str,
    ) -> Result<MintReceipt> {
        let amount = Amount::new(amount)?;
        let mut history = self.history.write().await;
        self.ensure_registered(to).await?;

        let tx = Transaction::new(
            UserId::system(),
            to.clone(),
            amount,
            description,
            next_timestamp(&history),
        );
        self.commit(&mut history, &tx).await?;

        let new_balance = derive_balance(history.iter(), to);
        info!("minted {amount} to {to}, balance now {new_balance}");
        Ok(MintReceipt {
            transaction: tx,
            new_balance,
        })
    }

    /// Moves `amount` from `from` to `to`. Fails without recording anything
    /// if `from` cannot cover it.
    pub async fn transfer(
        &self,
        from: &UserId,
        to: &UserId,
        amount: Decimal,
        description: &str,
    ) -> Result<TransferReceipt> {
        let amount = Amount::new(amount)?;
        let mut history = self.history.write().await;
        self.ensure_registered(from).await?;
        self.ensure_registered(to).await?;

        let balance = derive_balance(history.iter(), from);
        if !balance.covers(amount) {
            return Err(CoinError::InsufficientBalance {
                user: from.clone(),
                balance: balance.value(),
                requested: amount.value(),
            });
        }

        let tx = Transaction::new(
            from.clone(),
            to.clone(),
            amount,
            description,
            next_timestamp(&history),
        );
        self.commit(&mut history, &tx).await?;

        let from_balance = derive_balance(history.iter(), from);
        let to_balance = derive_balance(history.iter(), to);
        info!("transferred {amount} from {from} to {to}");
        Ok(TransferReceipt {
            transaction: tx,
            from_balance,
            to_balance,
        })
    }

    /// Derived balance of a registered user.
    pub async fn get_balance(&self, user_id: &UserId) -> Result<Balance> {
        self.ensure_registered(user_id).await?;
        Ok(derive_balance(self.history.read().await.iter(), user_id))
    }

    /// Balances of every registered user, keyed by identity.
    pub async fn balances(&self) -> Result<BTreeMap<UserId, Balance>> {
        let users = self.users.all_users().await?;
        let history = self.history.read().await;
        Ok(users
            .into_iter()
            .map(|u| {
                let balance = derive_balance(history.iter(), &u.id);
                (u.id, balance)
            })
            .collect())
    }

    /// The full history in append order.
    pub async fn get_ledger(&self) -> Vec<Transaction> {
        self.history.read().await.clone()
    }

    /// Transactions sent or received by `user_id`, mints included.
    pub async fn history(&self, user_id: &UserId) -> Result<Vec<Transaction>> {
        self.ensure_registered(user_id).await?;
        Ok(self
            .history
            .read()
            .await
            .iter()
            .filter(|tx| tx.involves(user_id))
            .cloned()
            .collect())
    }

    async fn ensure_registered(&self, user_id: &UserId) -> Result<()> {
        if user_id.is_system() || !self.users.exists(user_id).await? {
            return Err(CoinError::UnknownUser(user_id.clone()));
        }
        Ok(())
    }

    async fn commit(&self, history: &mut Vec<Transaction>, tx: &Transaction) -> Result<()> {
        self.log.append_transaction(tx).await?;
        history.push(tx.clone());
        if let Some(chain) = &self.chain {
            chain.add_transaction(tx.clone()).await;
        }
        Ok(())
    }
}

fn next_timestamp(history: &[Transaction]) -> i64 {
    let last = history.last().map_or(0, |tx| tx.timestamp);
    now_millis().max(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::infrastructure::in_memory::{
        InMemoryChainStore, InMemoryTransactionLog, InMemoryUserRegistry,
    };
    use rust_decimal_macros::dec;

    async fn engine_with(users: &[&str]) -> LedgerEngine {
        let engine = LedgerEngine::open(
            Box::new(InMemoryUserRegistry::new()),
            Box::new(InMemoryTransactionLog::new()),
        )
        .await
        .unwrap();
        for user in users {
            engine.create_wallet(&(*user).into()).await.unwrap();
        }
        engine
    }

    #[tokio::test]
    async fn test_new_wallet_has_zero_balance() {
        let engine = engine_with(&["alice"]).await;
        assert_eq!(
            engine.get_balance(&"alice".into()).await.unwrap(),
            Balance::ZERO
        );
    }

    #[tokio::test]
    async fn test_create_wallet_is_idempotent() {
        let engine = engine_with(&["alice"]).await;
        engine.create_wallet(&"alice".into()).await.unwrap();
        assert_eq!(engine.balances().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_system_identity_is_reserved() {
        let engine = engine_with(&[]).await;
        assert!(matches!(
            engine.create_wallet(&UserId::system()).await,
            Err(CoinError::ReservedIdentity(_))
        ));
        assert!(matches!(
            engine.mint(&UserId::system(), dec!(1), "").await,
            Err(CoinError::UnknownUser(_))
        ));
    }

    #[tokio::test]
    async fn test_mint_credits_and_records_system_sender() {
        let engine = engine_with(&["alice"]).await;
        let receipt = engine.mint(&"alice".into(), dec!(1000), "welcome").await.unwrap();

        assert_eq!(receipt.new_balance, Balance::new(dec!(1000)));
        assert!(receipt.transaction.is_mint());
        assert_eq!(receipt.transaction.description, "welcome");
        assert_eq!(engine.get_ledger().await, vec![receipt.transaction]);
    }

    #[tokio::test]
    async fn test_mint_rejects_unknown_user_and_bad_amount() {
        let engine = engine_with(&["alice"]).await;

        assert!(matches!(
            engine.mint(&"ghost".into(), dec!(10), "").await,
            Err(CoinError::UnknownUser(_))
        ));
        assert!(matches!(
            engine.mint(&"alice".into(), dec!(0), "").await,
            Err(CoinError::InvalidAmount(_))
        ));
        assert!(matches!(
            engine.mint(&"alice".into(), dec!(-5), "").await,
            Err(CoinError::InvalidAmount(_))
        ));
        assert!(engine.get_ledger().await.is_empty());
    }

    #[tokio::test]
    async fn test_transfer_moves_balance() {
        let engine = engine_with(&["alice", "bob"]).await;
        engine.mint(&"alice".into(), dec!(1000), "").await.unwrap();

        let receipt = engine
            .transfer(&"alice".into(), &"bob".into(), dec!(250), "lunch")
            .await
            .unwrap();
        assert_eq!(receipt.from_balance, Balance::new(dec!(750)));
        assert_eq!(receipt.to_balance, Balance::new(dec!(250)));
    }

    #[tokio::test]
    async fn test_transfer_insufficient_balance_appends_nothing() {
        let engine = engine_with(&["alice", "bob"]).await;
        engine.mint(&"alice".into(), dec!(700), "").await.unwrap();

        let err = engine
            .transfer(&"alice".into(), &"bob".into(), dec!(10000), "")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoinError::InsufficientBalance { balance, requested, .. }
                if balance == dec!(700) && requested == dec!(10000)
        ));
        assert_eq!(engine.get_ledger().await.len(), 1);
    }

    #[tokio::test]
    async fn test_transfer_requires_both_parties() {
        let engine = engine_with(&["alice"]).await;
        engine.mint(&"alice".into(), dec!(10), "").await.unwrap();

        assert!(matches!(
            engine.transfer(&"alice".into(), &"ghost".into(), dec!(1), "").await,
            Err(CoinError::UnknownUser(id)) if id.as_str() == "ghost"
        ));
        assert!(matches!(
            engine.transfer(&"ghost".into(), &"alice".into(), dec!(1), "").await,
            Err(CoinError::UnknownUser(id)) if id.as_str() == "ghost"
        ));
    }

    #[tokio::test]
    async fn test_get_balance_of_unregistered_user_is_an_error() {
        let engine = engine_with(&[]).await;
        assert!(matches!(
            engine.get_balance(&"ghost".into()).await,
            Err(CoinError::UnknownUser(_))
        ));
    }

    #[tokio::test]
    async fn test_history_filters_by_participant() {
        let engine = engine_with(&["alice", "bob", "carol"]).await;
        engine.mint(&"alice".into(), dec!(100), "").await.unwrap();
        engine.mint(&"carol".into(), dec!(100), "").await.unwrap();
        engine
            .transfer(&"alice".into(), &"bob".into(), dec!(10), "")
            .await
            .unwrap();

        assert_eq!(engine.history(&"alice".into()).await.unwrap().len(), 2);
        assert_eq!(engine.history(&"bob".into()).await.unwrap().len(), 1);
        assert_eq!(engine.history(&"carol".into()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_timestamps_never_decrease() {
        let engine = engine_with(&["alice", "bob"]).await;
        engine.mint(&"alice".into(), dec!(100), "").await.unwrap();
        for _ in 0..10 {
            engine
                .transfer(&"alice".into(), &"bob".into(), dec!(1), "")
                .await
                .unwrap();
        }
        let ledger = engine.get_ledger().await;
        assert!(ledger.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_reopen_replays_log() {
        let users = InMemoryUserRegistry::new();
        let log = InMemoryTransactionLog::new();
        let engine = LedgerEngine::open(Box::new(users.clone()), Box::new(log.clone()))
            .await
            .unwrap();
        engine.create_wallet(&"alice".into()).await.unwrap();
        engine.mint(&"alice".into(), dec!(42), "").await.unwrap();
        drop(engine);

        let engine = LedgerEngine::open(Box::new(users), Box::new(log)).await.unwrap();
        assert_eq!(
            engine.get_balance(&"alice".into()).await.unwrap(),
            Balance::new(dec!(42))
        );
    }

    #[tokio::test]
    async fn test_committed_transactions_reach_chain_pool() {
        let chain = Arc::new(
            ChainEngine::open(
                Box::new(InMemoryChainStore::new()),
                &EngineConfig::default().with_difficulty(1),
            )
            .await
            .unwrap(),
        );
        let engine = engine_with(&["alice", "bob"]).await.with_chain(chain.clone());

        engine.mint(&"alice".into(), dec!(5), "").await.unwrap();
        let _ = engine
            .transfer(&"alice".into(), &"bob".into(), dec!(50), "")
            .await;

        assert_eq!(chain.pending_transactions().await, engine.get_ledger().await);
    }
}

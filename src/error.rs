use crate::domain::user::UserId;
use miette::Diagnostic;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors surfaced by the ledger and chain engines and their stores.
///
/// Every validation failure is raised before anything is written, so a
/// caller receiving an error can assume the engine state is unchanged.
#[derive(Error, Diagnostic, Debug)]
pub enum CoinError {
    #[error("Amount must be positive, got {0}")]
    #[diagnostic(code(karmakoin::invalid_amount))]
    InvalidAmount(Decimal),

    #[error("User does not exist: {0}")]
    #[diagnostic(
        code(karmakoin::unknown_user),
        help("register the identity before minting or transferring")
    )]
    UnknownUser(UserId),

    #[error("User already exists: {0}")]
    #[diagnostic(code(karmakoin::already_exists))]
    AlreadyExists(UserId),

    #[error("Identity {0} is reserved and cannot hold a wallet")]
    #[diagnostic(code(karmakoin::reserved_identity))]
    ReservedIdentity(UserId),

    #[error("Insufficient balance for {user}: has {balance}, requested {requested}")]
    #[diagnostic(code(karmakoin::insufficient_balance))]
    InsufficientBalance {
        user: UserId,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("Chain corrupted at block {index}")]
    #[diagnostic(code(karmakoin::chain_corrupted))]
    ChainCorrupted { index: u64 },

    #[error("Persistence failure: {0}")]
    #[diagnostic(code(karmakoin::persistence))]
    PersistenceFailure(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Invalid operation record: {0}")]
    #[diagnostic(code(karmakoin::invalid_record))]
    InvalidRecord(String),

    #[error("CSV error: {0}")]
    #[diagnostic(code(karmakoin::csv))]
    Csv(#[from] csv::Error),

    #[error("Seal worker failed: {0}")]
    #[diagnostic(code(karmakoin::seal_worker))]
    SealWorker(#[from] tokio::task::JoinError),
}

impl CoinError {
    pub fn persistence<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        CoinError::PersistenceFailure(err.into())
    }
}

impl From<std::io::Error> for CoinError {
    fn from(err: std::io::Error) -> Self {
        CoinError::persistence(err)
    }
}

impl From<serde_json::Error> for CoinError {
    fn from(err: serde_json::Error) -> Self {
        CoinError::persistence(err)
    }
}

impl From<tempfile::PersistError> for CoinError {
    fn from(err: tempfile::PersistError) -> Self {
        CoinError::persistence(err.error)
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for CoinError {
    fn from(err: rocksdb::Error) -> Self {
        CoinError::persistence(err)
    }
}

pub type Result<T> = std::result::Result<T, CoinError>;

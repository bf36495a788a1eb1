use clap::{Parser, Subcommand};
use karmakoin::application::chain::ChainEngine;
use karmakoin::application::ledger::LedgerEngine;
use karmakoin::config::{DEFAULT_DIFFICULTY, EngineConfig};
use karmakoin::domain::ports::{ChainStoreBox, TransactionLogBox, UserRegistryBox};
use karmakoin::domain::user::UserId;
use karmakoin::infrastructure::file::JsonFileStore;
use karmakoin::interfaces::csv::ledger_writer::LedgerWriter;
use karmakoin::interfaces::csv::operation_reader::{Operation, OperationReader};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding users.json, ledger.jsonl and chain.json
    #[arg(long, env = "KARMAKOIN_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Path to a RocksDB database. Requires the `storage-rocksdb` feature.
    #[arg(long, env = "KARMAKOIN_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Leading hex zeros a block hash must carry
    #[arg(long, env = "KARMAKOIN_DIFFICULTY", default_value_t = DEFAULT_DIFFICULTY,
          value_parser = clap::value_parser!(u8).range(0..=64))]
    difficulty: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a user (creates their wallet)
    Register { user: String },
    /// Credit new coins to a user
    Mint {
        user: String,
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
        #[arg(short, long, default_value = "Mint via CLI")]
        description: String,
        /// Register the user first if unknown
        #[arg(long)]
        create: bool,
    },
    /// Move coins between two users
    Transfer {
        from: String,
        to: String,
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
        #[arg(short, long, default_value = "CLI transfer")]
        description: String,
        /// Register unknown users first
        #[arg(long)]
        create: bool,
    },
    /// Show a user's balance
    Balance { user: String },
    /// Print every user's balance as CSV
    Balances,
    /// Show a user's balance and transactions
    History { user: String },
    /// Print the full ledger as CSV
    Ledger,
    /// Apply mint/transfer rows from a CSV file
    Import {
        input: PathBuf,
        /// Register unknown users first
        #[arg(long)]
        create: bool,
    },
    /// Seal every unsealed ledger transaction into a new block
    Seal,
    /// Verify hashes and links of the whole chain
    Validate,
    /// Print the latest block as JSON
    Latest,
    /// Print chain length, pending count and validity
    Status,
}

struct Stores {
    users: UserRegistryBox,
    log: TransactionLogBox,
    chain: ChainStoreBox,
}

#[cfg(feature = "storage-rocksdb")]
fn open_rocksdb(db_path: &Path, _data_dir: &Path) -> Result<Option<Stores>> {
    let store = karmakoin::infrastructure::rocksdb::RocksDBStore::open(db_path)?;
    Ok(Some(Stores {
        users: Box::new(store.clone()),
        log: Box::new(store.clone()),
        chain: Box::new(store),
    }))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_rocksdb(_db_path: &Path, data_dir: &Path) -> Result<Option<Stores>> {
    log::warn!(
        "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to JSON files in {}.",
        data_dir.display()
    );
    Ok(None)
}

fn open_stores(cli: &Cli) -> Result<Stores> {
    if let Some(db_path) = &cli.db_path
        && let Some(stores) = open_rocksdb(db_path, &cli.data_dir)?
    {
        return Ok(stores);
    }

    let store = JsonFileStore::open(&cli.data_dir)?;
    Ok(Stores {
        users: Box::new(store.clone()),
        log: Box::new(store.clone()),
        chain: Box::new(store),
    })
}

async fn ensure_wallets(ledger: &LedgerEngine, users: &[&UserId], create: bool) -> Result<()> {
    if create {
        for user in users {
            ledger.create_wallet(user).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = EngineConfig::default().with_difficulty(cli.difficulty);
    let stores = open_stores(&cli)?;

    let chain = Arc::new(ChainEngine::open(stores.chain, &config).await?);
    let ledger = LedgerEngine::open(stores.users, stores.log)
        .await?
        .with_chain(chain.clone());

    match cli.command {
        Command::Register { user } => {
            let user = UserId::from(user);
            ledger.create_wallet(&user).await?;
            println!("Registered {user}");
        }
        Command::Mint {
            user,
            amount,
            description,
            create,
        } => {
            let user = UserId::from(user);
            ensure_wallets(&ledger, &[&user], create).await?;
            let receipt = ledger.mint(&user, amount, &description).await?;
            println!("Minted {} to {user}", receipt.transaction.amount);
            println!("{user} balance: {}", receipt.new_balance);
        }
        Command::Transfer {
            from,
            to,
            amount,
            description,
            create,
        } => {
            let (from, to) = (UserId::from(from), UserId::from(to));
            ensure_wallets(&ledger, &[&from, &to], create).await?;
            let receipt = ledger.transfer(&from, &to, amount, &description).await?;
            println!("Transferred {} from {from} to {to}", receipt.transaction.amount);
            println!("{from} balance: {}", receipt.from_balance);
            println!("{to} balance: {}", receipt.to_balance);
        }
        Command::Balance { user } => {
            let user = UserId::from(user);
            println!("{user} balance: {}", ledger.get_balance(&user).await?);
        }
        Command::Balances => {
            let balances = ledger.balances().await?;
            LedgerWriter::new(io::stdout().lock()).write_balances(&balances)?;
        }
        Command::History { user } => {
            let user = UserId::from(user);
            println!("{user} balance: {}", ledger.get_balance(&user).await?);
            println!("Transactions:");
            for tx in ledger.history(&user).await? {
                println!(
                    "TX {}: {} -> {} | {} | {} | {}",
                    tx.id,
                    tx.from_user_id,
                    tx.to_user_id,
                    tx.amount,
                    tx.description,
                    chrono::DateTime::from_timestamp_millis(tx.timestamp)
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_default()
                );
            }
        }
        Command::Ledger => {
            let transactions = ledger.get_ledger().await;
            LedgerWriter::new(io::stdout().lock()).write_transactions(&transactions)?;
        }
        Command::Import { input, create } => {
            let file = File::open(input).into_diagnostic()?;
            let (mut applied, mut failed) = (0usize, 0usize);
            for op in OperationReader::new(file).operations() {
                let result = match op {
                    Ok(op) => apply(&ledger, op, create).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(()) => applied += 1,
                    Err(e) => {
                        failed += 1;
                        eprintln!("Error processing operation: {e}");
                    }
                }
            }
            println!("Applied {applied} operation(s), {failed} failed");
        }
        Command::Seal => {
            chain.sync_from_ledger(&ledger.get_ledger().await).await;
            let block = chain.seal_pending_transactions().await?;
            println!(
                "Sealed block {} with {} transaction(s): {}",
                block.index,
                block.transactions.len(),
                block.hash
            );
        }
        Command::Validate => {
            let report = chain.verify().await;
            if report.is_valid() {
                println!("Chain valid ({} blocks)", report.blocks_checked);
            } else {
                for fault in &report.faults {
                    println!("Block {}: {:?}", fault.index, fault.kind);
                }
                report.into_result()?;
            }
        }
        Command::Latest => {
            let block = chain.get_latest_block().await;
            println!("{}", serde_json::to_string_pretty(&block).into_diagnostic()?);
        }
        Command::Status => {
            chain.sync_from_ledger(&ledger.get_ledger().await).await;
            println!("blocks: {}", chain.len().await);
            println!("pending: {}", chain.pending_transactions().await.len());
            println!("valid: {}", chain.is_chain_valid().await);
        }
    }

    Ok(())
}

async fn apply(
    ledger: &LedgerEngine,
    op: Operation,
    create: bool,
) -> karmakoin::error::Result<()> {
    if create {
        for user in op.parties() {
            ledger.create_wallet(user).await?;
        }
    }
    match op {
        Operation::Mint {
            to,
            amount,
            description,
        } => ledger.mint(&to, amount, &description).await.map(|_| ()),
        Operation::Transfer {
            from,
            to,
            amount,
            description,
        } => ledger
            .transfer(&from, &to, amount, &description)
            .await
            .map(|_| ()),
    }
}

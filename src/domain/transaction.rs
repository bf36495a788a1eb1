use super::money::{Amount, Balance};
use super::user::UserId;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// An immutable ledger entry moving `amount` from one identity to another.
///
/// Field order is part of the canonical encoding used for block hashes and
/// must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub amount: Amount,
    pub description: String,
    /// Creation time, unix milliseconds. Zero means "not yet assigned".
    #[serde(default)]
    pub timestamp: i64,
}

impl Transaction {
    pub fn new(
        from_user_id: UserId,
        to_user_id: UserId,
        amount: Amount,
        description: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_user_id,
            to_user_id,
            amount,
            description: description.into(),
            timestamp,
        }
    }

    pub fn is_mint(&self) -> bool {
        self.from_user_id.is_system()
    }

    pub fn involves(&self, user_id: &UserId) -> bool {
        &self.from_user_id == user_id || &self.to_user_id == user_id
    }

    /// Net effect of this transaction on `user_id`'s balance.
    pub fn effect_on(&self, user_id: &UserId) -> Balance {
        let mut effect = Balance::ZERO;
        if &self.to_user_id == user_id {
            effect += Balance::from(self.amount);
        }
        if &self.from_user_id == user_id {
            effect -= Balance::from(self.amount);
        }
        effect
    }

    /// Feeds the canonical, length-prefixed encoding into `hasher`.
    pub(crate) fn write_canonical(&self, hasher: &mut Sha256) {
        write_field(hasher, self.id.to_string().as_bytes());
        write_field(hasher, self.from_user_id.as_str().as_bytes());
        write_field(hasher, self.to_user_id.as_str().as_bytes());
        write_field(
            hasher,
            self.amount.value().normalize().to_string().as_bytes(),
        );
        write_field(hasher, self.description.as_bytes());
        hasher.update(self.timestamp.to_be_bytes());
    }
}

/// A transaction as stored inside a sealed block. The amount is kept as
/// written so a tampered value reaches chain verification instead of
/// failing the load.
#[derive(Deserialize)]
struct SealedRecord {
    id: Uuid,
    from_user_id: UserId,
    to_user_id: UserId,
    amount: Decimal,
    description: String,
    #[serde(default)]
    timestamp: i64,
}

impl From<SealedRecord> for Transaction {
    fn from(record: SealedRecord) -> Self {
        Self {
            id: record.id,
            from_user_id: record.from_user_id,
            to_user_id: record.to_user_id,
            amount: Amount::from_sealed(record.amount),
            description: record.description,
            timestamp: record.timestamp,
        }
    }
}

pub(crate) fn deserialize_sealed<'de, D>(deserializer: D) -> Result<Vec<Transaction>, D::Error>
where
    D: Deserializer<'de>,
{
    let records = Vec::<SealedRecord>::deserialize(deserializer)?;
    Ok(records.into_iter().map(Transaction::from).collect())
}

/// Current wall-clock time in unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn write_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// Replays `transactions` and returns the resulting balance of `user_id`.
pub fn derive_balance<'a, I>(transactions: I, user_id: &UserId) -> Balance
where
    I: IntoIterator<Item = &'a Transaction>,
{
    transactions
        .into_iter()
        .map(|tx| tx.effect_on(user_id))
        .sum()
}

use crate::domain::user::UserId;
use crate::error::{CoinError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Mint,
    Transfer,
}

/// One raw CSV row: `type, from, to, amount, description`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct OperationRecord {
    pub r#type: OperationType,
    pub from: Option<String>,
    pub to: String,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

/// A validated ledger operation ready to hand to the engine.
#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Mint {
        to: UserId,
        amount: Decimal,
        description: String,
    },
    Transfer {
        from: UserId,
        to: UserId,
        amount: Decimal,
        description: String,
    },
}

impl Operation {
    /// Identities the operation references.
    pub fn parties(&self) -> Vec<&UserId> {
        match self {
            Operation::Mint { to, .. } => vec![to],
            Operation::Transfer { from, to, .. } => vec![from, to],
        }
    }
}

impl TryFrom<OperationRecord> for Operation {
    type Error = CoinError;

    fn try_from(record: OperationRecord) -> Result<Self> {
        let description = record.description.unwrap_or_default();
        match record.r#type {
            OperationType::Mint => Ok(Operation::Mint {
                to: record.to.into(),
                amount: record.amount,
                description,
            }),
            OperationType::Transfer => {
                let from = record
                    .from
                    .filter(|f| !f.is_empty())
                    .ok_or_else(|| CoinError::InvalidRecord("transfer missing sender".into()))?;
                Ok(Operation::Transfer {
                    from: from.into(),
                    to: record.to.into(),
                    amount: record.amount,
                    description,
                })
            }
        }
    }
}

/// Reads ledger operations from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// and yields one `Result<Operation>` per row so a bad row never stops the
/// stream.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and validates operations.
    pub fn operations(self) -> impl Iterator<Item = Result<Operation>> {
        self.reader
            .into_deserialize::<OperationRecord>()
            .map(|result| result.map_err(CoinError::from).and_then(Operation::try_from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "type, from, to, amount, description\n\
                    mint, , alice, 1000, welcome\n\
                    transfer, alice, bob, 250.5, lunch";
        let reader = OperationReader::new(data.as_bytes());
        let results: Vec<Result<Operation>> = reader.operations().collect();

        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0].as_ref().unwrap(),
            &Operation::Mint {
                to: "alice".into(),
                amount: dec!(1000),
                description: "welcome".into(),
            }
        );
        assert_eq!(
            results[1].as_ref().unwrap(),
            &Operation::Transfer {
                from: "alice".into(),
                to: "bob".into(),
                amount: dec!(250.5),
                description: "lunch".into(),
            }
        );
    }

    #[test]
    fn test_reader_description_is_optional() {
        let data = "type, from, to, amount\nmint, , alice, 5";
        let reader = OperationReader::new(data.as_bytes());
        let op = reader.operations().next().unwrap().unwrap();
        assert!(matches!(op, Operation::Mint { description, .. } if description.is_empty()));
    }

    #[test]
    fn test_reader_malformed_lines() {
        let data = "type, from, to, amount, description\n\
                    burn, alice, bob, 1, x\n\
                    transfer, , bob, 1, x\n\
                    mint, , alice, lots, x";
        let reader = OperationReader::new(data.as_bytes());
        let results: Vec<Result<Operation>> = reader.operations().collect();

        assert!(matches!(results[0], Err(CoinError::Csv(_))));
        assert!(matches!(results[1], Err(CoinError::InvalidRecord(_))));
        assert!(matches!(results[2], Err(CoinError::Csv(_))));
    }

    #[test]
    fn test_parties() {
        let op = Operation::Transfer {
            from: "alice".into(),
            to: "bob".into(),
            amount: dec!(1),
            description: String::new(),
        };
        assert_eq!(op.parties().len(), 2);
    }
}

use crate::domain::money::Balance;
use crate::domain::transaction::Transaction;
use crate::domain::user::UserId;
use crate::error::Result;
use std::io::Write;

/// Writes ledger transactions and derived balances as CSV.
pub struct LedgerWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> LedgerWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// One row per transaction, in ledger order:
    /// `id,from_user_id,to_user_id,amount,description,timestamp`.
    pub fn write_transactions<'a, I>(&mut self, transactions: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut wrote_any = false;
        for tx in transactions {
            self.writer.serialize(tx)?;
            wrote_any = true;
        }
        if !wrote_any {
            self.writer.write_record([
                "id",
                "from_user_id",
                "to_user_id",
                "amount",
                "description",
                "timestamp",
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// `user,balance` rows with normalized balances.
    pub fn write_balances<'a, I>(&mut self, balances: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a UserId, &'a Balance)>,
    {
        self.writer.write_record(["user", "balance"])?;
        for (user, balance) in balances {
            self.writer
                .write_record([user.as_str(), balance.to_string().as_str()])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Amount;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    #[test]
    fn test_write_transactions() {
        let tx = Transaction::new(
            "alice".into(),
            "bob".into(),
            Amount::new(dec!(250)).unwrap(),
            "lunch",
            1_700_000_000_000,
        );
        let mut out = Vec::new();
        LedgerWriter::new(&mut out)
            .write_transactions([&tx])
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,from_user_id,to_user_id,amount,description,timestamp"
        );
        assert_eq!(
            lines.next().unwrap(),
            format!("{},alice,bob,250,lunch,1700000000000", tx.id)
        );
    }

    #[test]
    fn test_write_empty_ledger_keeps_header() {
        let mut out = Vec::new();
        LedgerWriter::new(&mut out)
            .write_transactions(std::iter::empty::<&Transaction>())
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap().trim(),
            "id,from_user_id,to_user_id,amount,description,timestamp"
        );
    }

    #[test]
    fn test_write_balances() {
        let mut balances = BTreeMap::new();
        balances.insert(UserId::from("alice"), Balance::new(dec!(700.00)));
        balances.insert(UserId::from("bob"), Balance::new(dec!(300)));

        let mut out = Vec::new();
        LedgerWriter::new(&mut out).write_balances(&balances).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "user,balance\nalice,700\nbob,300\n"
        );
    }
}

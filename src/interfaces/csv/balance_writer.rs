use crate::domain::wallet::WalletAccount;
use crate::error::Result;
use std::io::Write;

/// Writes final wallet balances as CSV, sorted by owner for deterministic
/// output.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_balances(&mut self, mut wallets: Vec<WalletAccount>) -> Result<()> {
        wallets.sort_by(|a, b| a.owner.cmp(&b.owner));
        self.writer.write_record(["actor", "balance"])?;
        for wallet in wallets {
            self.writer
                .write_record([wallet.owner.to_string(), wallet.balance.to_string()])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::BankConfig;
use crate::transaction::Transaction;

pub mod n26;

/// A bank account transactions can be loaded from
#[async_trait]
pub trait TransactionSource: Send {
    /// Name of the account in the ledger
    fn name(&self) -> &str;

    /// Transactions in `[start, end)`, in the order the bank returned them.
    /// Login happens on first use, so errors here can also be authentication failures.
    async fn load_transactions(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>>;
}

pub fn connect(config: &BankConfig) -> Result<Box<dyn TransactionSource>> {
    match config {
        BankConfig::N26(config) => Ok(Box::new(n26::N26Source::new(config.clone())?)),
    }
}

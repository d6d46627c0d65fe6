use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

use crate::bank_api::TransactionSource;
use crate::firefly_api::{LedgerApi, SubmitError};
use crate::transaction::Transaction;
use crate::watermark::WatermarkStore;

const SEPARATOR: &str = "----------------------------------------------------------------------";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Created,
    Duplicate,
    Failed(String),
}

#[derive(Debug)]
pub struct AccountReport {
    pub account: String,
    /// Err if the transactions of this account couldn't be loaded at all
    pub result: Result<Vec<(Transaction, ImportOutcome)>, String>,
}

impl AccountReport {
    fn count(&self, predicate: impl Fn(&ImportOutcome) -> bool) -> usize {
        match &self.result {
            Ok(outcomes) => outcomes
                .iter()
                .filter(|(_, outcome)| predicate(outcome))
                .count(),
            Err(_) => 0,
        }
    }

    pub fn num_created(&self) -> usize {
        self.count(|outcome| *outcome == ImportOutcome::Created)
    }

    pub fn num_duplicates(&self) -> usize {
        self.count(|outcome| *outcome == ImportOutcome::Duplicate)
    }

    pub fn num_failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, ImportOutcome::Failed(_)))
    }
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub accounts: Vec<AccountReport>,
}

impl ImportReport {
    pub fn num_created(&self) -> usize {
        self.accounts.iter().map(AccountReport::num_created).sum()
    }

    pub fn num_duplicates(&self) -> usize {
        self.accounts.iter().map(AccountReport::num_duplicates).sum()
    }

    pub fn num_failed(&self) -> usize {
        self.accounts.iter().map(AccountReport::num_failed).sum()
    }

    pub fn all_accounts_loaded(&self) -> bool {
        self.accounts.iter().all(|account| account.result.is_ok())
    }

    /// No failed transactions and every account could be loaded. Duplicates are fine.
    pub fn is_clean(&self) -> bool {
        self.accounts
            .iter()
            .all(|account| account.result.is_ok() && account.num_failed() == 0)
    }
}

/// What happened when [Importer::auto_import] ran
#[derive(Debug)]
pub enum AutoImportResult {
    /// First run, the watermark was created and nothing was imported
    Initialized { at: DateTime<Utc> },
    Imported {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        report: ImportReport,
        /// False if an account couldn't be loaded and the watermark was kept for a retry
        advanced: bool,
    },
}

/// Loads transactions from all configured bank accounts and creates them in the ledger.
///
/// Accounts are processed one after the other in configuration order and transactions are
/// submitted in the order the bank returned them. A failing transaction doesn't stop the others
/// and an account that can't be loaded doesn't stop the other accounts. Watermark errors are fatal.
pub struct Importer<L: LedgerApi, W: WatermarkStore> {
    sources: Vec<Box<dyn TransactionSource>>,
    ledger: L,
    watermark: W,
    clock: fn() -> DateTime<Utc>,
}

impl<L: LedgerApi, W: WatermarkStore> Importer<L, W> {
    pub fn new(sources: Vec<Box<dyn TransactionSource>>, ledger: L, watermark: W) -> Self {
        Self {
            sources,
            ledger,
            watermark,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Import everything in `[start, end)`. Doesn't touch the watermark.
    pub async fn run(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> ImportReport {
        log::info!("Importing transactions from {start} to {end}");
        let mut report = ImportReport::default();
        for source in &mut self.sources {
            let account = source.name().to_string();
            let result = match source.load_transactions(start, end).await {
                Ok(transactions) => {
                    log::info!(
                        "Loaded {} transactions from account '{}'",
                        transactions.len(),
                        account
                    );
                    let mut outcomes = Vec::with_capacity(transactions.len());
                    for transaction in transactions {
                        let outcome = submit(&self.ledger, &transaction).await;
                        outcomes.push((transaction, outcome));
                    }
                    Ok(outcomes)
                }
                Err(err) => {
                    log::error!("Failed to load transactions from account '{account}': {err:#}");
                    Err(format!("{err:#}"))
                }
            };
            report.accounts.push(AccountReport { account, result });
        }
        report
    }

    /// Import everything since the last auto import.
    /// The first call only remembers the current time.
    pub async fn auto_import(&mut self) -> Result<AutoImportResult> {
        let now = (self.clock)();
        let Some(start) = self.watermark.load().await? else {
            log::info!("{SEPARATOR}");
            log::info!(
                "Auto importer is executed the first time. \
                 The last execution timestamp is created with the current date"
            );
            log::info!("The next time auto importer is executed it will start from this date");
            log::info!("{SEPARATOR}");
            self.watermark.initialize(now).await?;
            return Ok(AutoImportResult::Initialized { at: now });
        };

        log::info!("{SEPARATOR}");
        log::info!("Running auto import from {start}");
        log::info!("{SEPARATOR}");

        let report = self.run(start, now).await;
        // Failed or duplicate transactions are logged and don't hold back the watermark,
        // but an account that couldn't be loaded would lose the whole window
        let advanced = report.all_accounts_loaded();
        if advanced {
            self.watermark.advance(now).await?;
            log::info!("Last execution timestamp advanced to {now}");
        } else {
            log::error!(
                "Not all accounts could be loaded, keeping the last execution timestamp at {start}. \
                 The next run retries from there."
            );
        }

        Ok(AutoImportResult::Imported {
            start,
            end: now,
            report,
            advanced,
        })
    }

    pub async fn reset_auto_import(&mut self) -> Result<DateTime<Utc>> {
        let now = (self.clock)();
        self.watermark.reset(now).await?;
        log::info!("Auto import was reset, the next run imports transactions after {now}");
        Ok(now)
    }

    /// Loads transactions without submitting them, sorted by date.
    /// `start` defaults to the last auto import, `end` to now.
    pub async fn list(
        &mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Transaction>> {
        let start = match start {
            Some(start) => start,
            None => self.watermark.load().await?.ok_or_else(|| {
                anyhow!("Auto import was never executed, please give a start date")
            })?,
        };
        let end = end.unwrap_or_else(self.clock);

        let mut result = Vec::new();
        for source in &mut self.sources {
            match source.load_transactions(start, end).await {
                Ok(transactions) => result.extend(transactions),
                Err(err) => log::error!(
                    "Failed to load transactions from account '{}': {err:#}",
                    source.name()
                ),
            }
        }
        result.sort_by_key(|transaction| transaction.date);
        Ok(result)
    }
}

async fn submit(ledger: &impl LedgerApi, transaction: &Transaction) -> ImportOutcome {
    log::info!("CREATE - {transaction}");
    log::debug!("{transaction:?}");
    match ledger.create_transaction(transaction).await {
        Ok(()) => {
            log::info!("Transaction CREATED");
            ImportOutcome::Created
        }
        Err(SubmitError::Duplicate) => {
            log::warn!(
                "Duplicate transaction '{}' from '{}' to '{}' - Amount: {} {}",
                transaction.description,
                transaction.source,
                transaction.destination,
                transaction.amount,
                transaction.currency,
            );
            ImportOutcome::Duplicate
        }
        Err(SubmitError::ApiFailure(detail)) => {
            log::error!("Failed to create {transaction}: {detail}");
            ImportOutcome::Failed(detail)
        }
    }
}

use anyhow::{bail, Context as _, Result};
use chrono::Utc;
use console::{style, StyledObject};

use crate::args::{Args, Operation};
use crate::bank_api::{self, TransactionSource};
use crate::config::Config;
use crate::firefly_api::FireflyClient;
use crate::importer::{AccountReport, AutoImportResult, ImportOutcome, ImportReport, Importer};
use crate::terminal::{self, BulletPointPrinter, LineWriter};
use crate::watermark::FileWatermarkStore;

pub async fn main(args: Args) -> Result<()> {
    let operation = args.operation()?;
    let config = Config::load(&args.config).await?;

    let sources = config
        .banks
        .iter()
        .map(bank_api::connect)
        .collect::<Result<Vec<Box<dyn TransactionSource>>>>()
        .context("Failed to set up bank connections")?;
    let ledger = FireflyClient::new(&config.firefly.host, config.firefly.token.clone())?;
    let watermark = FileWatermarkStore::new(config.watermark_path.clone());
    let mut importer = Importer::new(sources, ledger, watermark);

    let printer = BulletPointPrinter::new_stdout();
    match operation {
        Operation::AutoImport => {
            log::info!("Running auto importer");
            match importer.auto_import().await? {
                AutoImportResult::Initialized { at } => {
                    println!("{}", style_header("Auto import initialized"));
                    printer.print_item(format!(
                        "The next run imports transactions after {}",
                        at.with_timezone(&chrono::Local)
                    ));
                }
                AutoImportResult::Imported {
                    report, advanced, ..
                } => {
                    print_report(&printer, &report);
                    if !advanced {
                        printer.print_item(
                            style("The next run retries from the last execution timestamp")
                                .yellow(),
                        );
                    }
                    check_report(&report)?;
                }
            }
        }
        Operation::Run { start, end } => {
            let end = end.unwrap_or_else(Utc::now);
            let report = importer.run(start, end).await;
            print_report(&printer, &report);
            check_report(&report)?;
        }
        Operation::Reset => {
            let now = importer.reset_auto_import().await?;
            println!("{}", style_header("Auto import reset"));
            printer.print_item(format!(
                "The next run imports transactions after {}",
                now.with_timezone(&chrono::Local)
            ));
        }
        Operation::List { start, end } => {
            let transactions = importer.list(start, end).await?;
            println!("{}", terminal::format_transaction_table(&transactions));
        }
    }
    Ok(())
}

pub fn print_report<W: LineWriter + Clone>(
    printer: &BulletPointPrinter<W>,
    report: &ImportReport,
) {
    printer.print_item(style_header("Import summary:"));
    let printer = printer.indent();
    if report.accounts.is_empty() {
        printer.print_item(style("(no accounts configured)").italic());
    }
    for account in &report.accounts {
        print_account_report(&printer, account);
    }
}

/// Fails if some transactions weren't imported, so schedulers notice
fn check_report(report: &ImportReport) -> Result<()> {
    if !report.is_clean() {
        bail!(
            "Import finished with {} failed transactions and {} accounts that couldn't be loaded",
            report.num_failed(),
            report
                .accounts
                .iter()
                .filter(|account| account.result.is_err())
                .count(),
        );
    }
    Ok(())
}

fn print_account_report<W: LineWriter + Clone>(
    printer: &BulletPointPrinter<W>,
    account: &AccountReport,
) {
    printer.print_item(style_account(&account.account));
    let printer = printer.indent();
    match &account.result {
        Err(err) => {
            printer.print_item(style(format!("Failed to load transactions: {err}")).red())
        }
        Ok(outcomes) => {
            printer.print_item(format!(
                "{} created, {} duplicates, {} failed",
                style(account.num_created()).green(),
                style(account.num_duplicates()).yellow(),
                style(account.num_failed()).red(),
            ));
            let failures = printer.indent();
            for (transaction, outcome) in outcomes {
                if let ImportOutcome::Failed(detail) = outcome {
                    failures.print_item(style(format!("{transaction}: {detail}")).red());
                }
            }
        }
    }
}

fn style_header(header: &str) -> StyledObject<&str> {
    style(header).bold().underlined()
}

fn style_account(account: &str) -> StyledObject<&str> {
    style(account).cyan().bold()
}

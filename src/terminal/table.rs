use console::{pad_str, Alignment};

use crate::transaction::Transaction;

const DATE_WIDTH: usize = 19;
const NAME_WIDTH: usize = 30;
const AMOUNT_WIDTH: usize = 15;
const COLUMN_SEPARATOR: &str = "  ";
const TRUNCATION_MARKER: &str = "…";

/// One line per transaction in the given order, with a header line
pub fn format_transaction_table(transactions: &[Transaction]) -> String {
    let mut lines = Vec::with_capacity(transactions.len() + 1);
    lines.push(format_row("Date", "From", "To", "Amount", "Description"));
    for transaction in transactions {
        lines.push(format_row(
            &transaction.date.format("%Y-%m-%d %H:%M:%S").to_string(),
            &transaction.source,
            &transaction.destination,
            &format!("{} {}", transaction.amount, transaction.currency),
            &transaction.description,
        ));
    }
    lines.join("\n")
}

fn format_row(date: &str, from: &str, to: &str, amount: &str, description: &str) -> String {
    [
        pad_str(date, DATE_WIDTH, Alignment::Left, None),
        pad_str(from, NAME_WIDTH, Alignment::Left, Some(TRUNCATION_MARKER)),
        pad_str(to, NAME_WIDTH, Alignment::Left, Some(TRUNCATION_MARKER)),
        pad_str(amount, AMOUNT_WIDTH, Alignment::Right, Some(TRUNCATION_MARKER)),
        description.into(),
    ]
    .join(COLUMN_SEPARATOR)
    .trim_end()
    .to_string()
}

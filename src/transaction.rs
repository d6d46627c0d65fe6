use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use std::fmt::{Debug, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Withdrawal,
    Deposit,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Deposit => "deposit",
            TransactionType::Transfer => "transfer",
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ForeignAmount {
    pub amount: Decimal,
    pub currency: String,
}

impl Debug for ForeignAmount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// A bank transaction in the shape the ledger accepts, independent of the bank it came from.
///
/// `amount` is always non-negative, the direction is carried by `ty` together with
/// `source` and `destination`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub amount: Decimal,
    pub currency: String,
    pub source: String,
    pub destination: String,
    pub date: DateTime<Local>,
    pub category: String,
    pub description: String,
    pub notes: String,
    pub ty: TransactionType,
    // Both foreign fields live in one Option so one can't be set without the other
    pub foreign: Option<ForeignAmount>,
}

impl Display for Transaction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Transaction '{}' from '{}' to '{}' - Amount {} {}",
            self.description, self.source, self.destination, self.amount, self.currency,
        )
    }
}

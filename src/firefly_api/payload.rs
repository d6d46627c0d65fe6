use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::transaction::Transaction;

/// Request body of `POST /api/v1/transactions`
#[derive(Serialize, Debug)]
pub struct TransactionStore<'a> {
    pub apply_rules: bool,
    pub error_if_duplicate_hash: bool,
    pub fire_webhooks: bool,
    pub transactions: Vec<TransactionSplitStore<'a>>,
}

#[derive(Serialize, Debug)]
pub struct TransactionSplitStore<'a> {
    #[serde(rename = "type")]
    pub type_: &'static str,
    pub date: DateTime<Local>,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub description: &'a str,
    pub currency_code: &'a str,
    pub category_name: &'a str,
    pub source_name: &'a str,
    pub destination_name: &'a str,
    pub notes: &'a str,
    #[serde(
        with = "rust_decimal::serde::str_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub foreign_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_currency_code: Option<&'a str>,
}

impl<'a> TransactionStore<'a> {
    pub fn single_split(transaction: &'a Transaction) -> Self {
        Self {
            apply_rules: true,
            error_if_duplicate_hash: true,
            fire_webhooks: true,
            transactions: vec![TransactionSplitStore {
                type_: transaction.ty.as_str(),
                date: transaction.date,
                amount: transaction.amount,
                description: &transaction.description,
                currency_code: &transaction.currency,
                category_name: &transaction.category,
                source_name: &transaction.source,
                destination_name: &transaction.destination,
                notes: &transaction.notes,
                foreign_amount: transaction.foreign.as_ref().map(|foreign| foreign.amount),
                foreign_currency_code: transaction
                    .foreign
                    .as_ref()
                    .map(|foreign| foreign.currency.as_str()),
            }],
        }
    }
}

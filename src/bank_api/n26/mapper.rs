use anyhow::{anyhow, Result};
use chrono::{Local, TimeZone as _};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::transaction::{ForeignAmount, Transaction, TransactionType};

const CATEGORY_PREFIX: &str = "micro-v2-";
const ATM_WITHDRAW: &str = "AA";
const ATM_WITHDRAW_DESCRIPTION: &str = "ATM Withdrawal";
const NO_DESCRIPTION: &str = "-";

/// One entry of `GET /api/smrt/transactions`. Only the fields we use are listed.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub amount: Decimal,
    pub currency_code: String,
    #[serde(default)]
    pub original_amount: Option<Decimal>,
    #[serde(default)]
    pub original_currency: Option<String>,
    #[serde(default)]
    pub partner_name: Option<String>,
    #[serde(default)]
    pub merchant_name: Option<String>,
    /// Milliseconds since epoch
    #[serde(rename = "visibleTS")]
    pub visible_ts: i64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub reference_text: Option<String>,
}

pub fn map_transaction(account_name: &str, raw: RawTransaction) -> Result<Transaction> {
    // The ledger only takes second resolution
    let date = Local
        .timestamp_opt(raw.visible_ts.div_euclid(1000), 0)
        .single()
        .ok_or_else(|| {
            anyhow!(
                "Transaction {:?} has invalid timestamp {}",
                raw.id,
                raw.visible_ts
            )
        })?;

    let counterparty = raw
        .partner_name
        .or(raw.merchant_name)
        .unwrap_or_default();
    let (ty, source, destination) = if raw.amount <= Decimal::ZERO {
        (
            TransactionType::Withdrawal,
            account_name.to_string(),
            counterparty,
        )
    } else {
        (
            TransactionType::Deposit,
            counterparty,
            account_name.to_string(),
        )
    };

    let description = if raw.type_ == ATM_WITHDRAW {
        ATM_WITHDRAW_DESCRIPTION.to_string()
    } else {
        raw.reference_text
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| NO_DESCRIPTION.to_string())
    };

    let foreign = match (raw.original_amount, raw.original_currency) {
        (Some(amount), Some(currency)) if currency != raw.currency_code => Some(ForeignAmount {
            amount: amount.abs(),
            currency,
        }),
        _ => None,
    };

    Ok(Transaction {
        amount: raw.amount.abs(),
        currency: raw.currency_code,
        source,
        destination,
        date,
        category: normalize_category(&raw.category),
        description,
        notes: String::new(),
        ty,
        foreign,
    })
}

/// `micro-v2-media-electronics` becomes `Media & Electronics`.
/// Already normalized categories are left unchanged.
pub fn normalize_category(category: &str) -> String {
    let category = category.strip_prefix(CATEGORY_PREFIX).unwrap_or(category);
    category
        .split('-')
        .map(title_case)
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" & ")
}

fn title_case(token: &str) -> String {
    token
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn raw(value: serde_json::Value) -> RawTransaction {
        serde_json::from_value(value).unwrap()
    }

    fn card_payment(amount: f64) -> RawTransaction {
        raw(json!({
            "id": "tx-1",
            "type": "PT",
            "amount": amount,
            "currencyCode": "EUR",
            "merchantName": "Electronics Store",
            "visibleTS": 1_670_000_000_999_i64,
            "category": "micro-v2-media-electronics",
            "referenceText": "Order 123",
        }))
    }

    #[test]
    fn example_withdrawal() {
        let transaction = map_transaction(
            "Checking",
            raw(json!({
                "type": "PT",
                "amount": -15.99,
                "currencyCode": "EUR",
                "visibleTS": 1_670_000_000_000_i64,
                "category": "micro-v2-media-electronics",
                "referenceText": "-",
            })),
        )
        .unwrap();
        assert_eq!(Decimal::new(1599, 2), transaction.amount);
        assert_eq!("EUR", transaction.currency);
        assert_eq!(TransactionType::Withdrawal, transaction.ty);
        assert_eq!("Checking", transaction.source);
        assert_eq!("", transaction.destination);
        assert_eq!("Media & Electronics", transaction.category);
        assert_eq!("-", transaction.description);
        assert_eq!("", transaction.notes);
        assert_eq!(None, transaction.foreign);
    }

    #[rstest]
    fn direction_follows_sign(#[values(-100.0, -0.01, 0.0, 0.01, 100.0)] amount: f64) {
        let transaction = map_transaction("Checking", card_payment(amount)).unwrap();
        if amount <= 0.0 {
            assert_eq!(TransactionType::Withdrawal, transaction.ty);
            assert_eq!("Checking", transaction.source);
            assert_eq!("Electronics Store", transaction.destination);
        } else {
            assert_eq!(TransactionType::Deposit, transaction.ty);
            assert_eq!("Electronics Store", transaction.source);
            assert_eq!("Checking", transaction.destination);
        }
        assert!(transaction.amount >= Decimal::ZERO);
    }

    #[test]
    fn deposit_uses_partner_name() {
        let transaction = map_transaction(
            "Checking",
            raw(json!({
                "type": "CT",
                "amount": 2500.0,
                "currencyCode": "EUR",
                "partnerName": "Employer GmbH",
                "visibleTS": 1_670_000_000_000_i64,
                "category": "micro-v2-income",
                "referenceText": "Salary",
            })),
        )
        .unwrap();
        assert_eq!(TransactionType::Deposit, transaction.ty);
        assert_eq!(Decimal::new(2500, 0), transaction.amount);
        assert_eq!("Employer GmbH", transaction.source);
        assert_eq!("Checking", transaction.destination);
        assert_eq!("Income", transaction.category);
        assert_eq!("Salary", transaction.description);
    }

    #[test]
    fn missing_counterparty_is_empty() {
        let transaction = map_transaction(
            "Checking",
            raw(json!({
                "type": "CT",
                "amount": 5.0,
                "currencyCode": "EUR",
                "visibleTS": 1_670_000_000_000_i64,
                "category": "micro-v2-income",
            })),
        )
        .unwrap();
        assert_eq!("", transaction.source);
        assert_eq!("-", transaction.description);
    }

    #[test]
    fn atm_withdrawal() {
        let transaction = map_transaction(
            "Checking",
            raw(json!({
                "type": "AA",
                "amount": -50.0,
                "currencyCode": "EUR",
                "merchantName": "Some ATM",
                "visibleTS": 1_670_000_000_000_i64,
                "category": "micro-v2-atm",
                "referenceText": "ignored",
            })),
        )
        .unwrap();
        assert_eq!("ATM Withdrawal", transaction.description);
        assert_eq!("Atm", transaction.category);
    }

    #[test]
    fn date_is_truncated_to_seconds() {
        let transaction = map_transaction("Checking", card_payment(-1.0)).unwrap();
        assert_eq!(1_670_000_000, transaction.date.timestamp());
        assert_eq!(0, transaction.date.timestamp_subsec_nanos());
    }

    #[rstest]
    #[case(Some(json!(-20.0)), Some("USD"), Some((Decimal::new(20, 0), "USD")))]
    #[case(Some(json!(-20.0)), Some("EUR"), None)]
    #[case(Some(json!(-20.0)), None, None)]
    #[case(None, Some("USD"), None)]
    #[case(None, None, None)]
    fn foreign_amount_is_all_or_nothing(
        #[case] original_amount: Option<serde_json::Value>,
        #[case] original_currency: Option<&str>,
        #[case] expected: Option<(Decimal, &str)>,
    ) {
        let mut value = json!({
            "type": "PT",
            "amount": -18.5,
            "currencyCode": "EUR",
            "visibleTS": 1_670_000_000_000_i64,
            "category": "micro-v2-travel-holidays",
        });
        if let Some(original_amount) = original_amount {
            value["originalAmount"] = original_amount;
        }
        if let Some(original_currency) = original_currency {
            value["originalCurrency"] = json!(original_currency);
        }
        let transaction = map_transaction("Checking", raw(value)).unwrap();
        assert_eq!(
            expected.map(|(amount, currency)| ForeignAmount {
                amount,
                currency: currency.to_string(),
            }),
            transaction.foreign,
        );
    }

    #[rstest]
    #[case("micro-v2-media-electronics", "Media & Electronics")]
    #[case("micro-v2-food-groceries", "Food & Groceries")]
    #[case("micro-v2-income", "Income")]
    #[case("micro-v2-miscellaneous", "Miscellaneous")]
    #[case("micro-v2-bars-restaurants", "Bars & Restaurants")]
    #[case("MICRO-V2-SHOPPING", "Micro & V2 & Shopping")]
    #[case("", "")]
    fn category(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(expected, normalize_category(raw));
    }

    #[rstest]
    fn category_normalization_is_idempotent(
        #[values(
            "micro-v2-media-electronics",
            "micro-v2-food-groceries",
            "micro-v2-atm",
            "Media & Electronics",
            "bars-restaurants",
            "tax-and-fines"
        )]
        raw: &str,
    ) {
        let normalized = normalize_category(raw);
        assert_eq!(normalized, normalize_category(&normalized));
    }

    #[test]
    fn missing_amount_fails_to_parse() {
        let result: Result<RawTransaction, _> = serde_json::from_value(json!({
            "type": "PT",
            "currencyCode": "EUR",
            "visibleTS": 1_670_000_000_000_i64,
        }));
        assert!(result.is_err());
    }
}

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::TransactionSource;
use crate::config::N26Config;
use crate::transaction::Transaction;

mod client;
mod login_store;
mod mapper;

pub use client::N26Client;
pub use mapper::{map_transaction, normalize_category, RawTransaction};

const TRANSACTION_LIMIT: usize = 10000;

pub struct N26Source {
    name: String,
    client: N26Client,
}

impl N26Source {
    pub fn new(config: N26Config) -> Result<Self> {
        let client = N26Client::new(&config)?;
        Ok(Self::with_client(config.name, client))
    }

    pub fn with_client(name: String, client: N26Client) -> Self {
        Self { name, client }
    }
}

#[async_trait]
impl TransactionSource for N26Source {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_transactions(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let start_ms = start.timestamp_millis();
        let end_ms = end.timestamp_millis();
        let raw_transactions = self
            .client
            .get_transactions(start_ms, end_ms, TRANSACTION_LIMIT)
            .await?;
        if raw_transactions.len() >= TRANSACTION_LIMIT {
            log::warn!(
                "Got {} transactions for '{}', which is the request limit. \
                 Some transactions might be missing, please import a shorter time range.",
                raw_transactions.len(),
                self.name,
            );
        }

        // N26 includes the end of the range, but the next auto import starts there
        raw_transactions
            .into_iter()
            .filter(|raw| (start_ms..end_ms).contains(&raw.visible_ts))
            .map(|raw| map_transaction(&self.name, raw))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use httpmock::prelude::*;
    use reqwest::Url;
    use serde_json::{json, Value};

    use super::*;
    use crate::config::MfaType;
    use crate::firefly_api::{AccessToken, FireflyClient};
    use crate::importer::{ImportOutcome, Importer};
    use crate::watermark::FileWatermarkStore;

    async fn bank_server(transactions: Value) -> MockServer {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth2/token");
                then.status(200).json_body(json!({
                    "access_token": "access",
                    "refresh_token": "refresh",
                    "expires_in": 3600,
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/smrt/transactions");
                then.status(200).json_body(transactions);
            })
            .await;
        server
    }

    fn source(name: &str, server: &MockServer) -> N26Source {
        let config = N26Config {
            name: name.to_string(),
            username: "me@example.com".to_string(),
            password: "secret".to_string(),
            mfa_type: MfaType::App,
            device_token: None,
            login_data_store: None,
        };
        let base_url = Url::parse(&format!("{}/", server.base_url())).unwrap();
        let client = N26Client::with_base_url(&config, base_url).unwrap();
        N26Source::with_client(config.name, client)
    }

    fn start() -> DateTime<Utc> {
        Utc.timestamp_opt(1_670_000_000, 0).unwrap()
    }

    fn end() -> DateTime<Utc> {
        Utc.timestamp_opt(1_670_000_100, 0).unwrap()
    }

    #[tokio::test]
    async fn loads_half_open_range_in_bank_order() {
        let server = bank_server(json!([
            {"type": "PT", "amount": -1.0, "currencyCode": "EUR", "visibleTS": 1_670_000_100_000_i64,
             "category": "micro-v2-end", "referenceText": "at end"},
            {"type": "PT", "amount": -2.0, "currencyCode": "EUR", "visibleTS": 1_670_000_050_000_i64,
             "category": "micro-v2-later", "referenceText": "later"},
            {"type": "CT", "amount": 3.0, "currencyCode": "EUR", "visibleTS": 1_670_000_000_000_i64,
             "category": "micro-v2-earlier", "referenceText": "earlier"},
        ]))
        .await;
        let mut source = source("N26", &server);

        let transactions = source.load_transactions(start(), end()).await.unwrap();
        let descriptions: Vec<&str> = transactions
            .iter()
            .map(|t| t.description.as_str())
            .collect();
        assert_eq!(vec!["later", "earlier"], descriptions);
        assert_eq!("N26", source.name());
    }

    #[tokio::test]
    async fn malformed_record_fails_whole_account() {
        let server = bank_server(json!([
            {"type": "PT", "amount": -2.0, "currencyCode": "EUR", "visibleTS": 1_670_000_050_000_i64,
             "category": "micro-v2-food", "referenceText": "fine"},
            {"type": "PT", "currencyCode": "EUR", "visibleTS": 1_670_000_060_000_i64,
             "category": "micro-v2-food", "referenceText": "no amount"},
        ]))
        .await;
        let mut source = source("N26", &server);

        assert!(source.load_transactions(start(), end()).await.is_err());
    }

    #[tokio::test]
    async fn malformed_record_doesnt_stop_next_account() {
        let broken = bank_server(json!([
            {"type": "PT", "currencyCode": "EUR", "visibleTS": 1_670_000_060_000_i64,
             "category": "micro-v2-food", "referenceText": "no amount"},
        ]))
        .await;
        let working = bank_server(json!([
            {"type": "PT", "amount": -2.0, "currencyCode": "EUR", "visibleTS": 1_670_000_050_000_i64,
             "category": "micro-v2-food", "referenceText": "groceries"},
        ]))
        .await;
        let firefly = MockServer::start_async().await;
        let create = firefly
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/transactions");
                then.status(200).json_body(json!({"data": {}}));
            })
            .await;
        let tempdir = tempfile::tempdir().unwrap();
        let mut importer = Importer::new(
            vec![
                Box::new(source("Broken", &broken)),
                Box::new(source("Working", &working)),
            ],
            FireflyClient::new(&firefly.base_url(), AccessToken::new("token".to_string()))
                .unwrap(),
            FileWatermarkStore::new(tempdir.path().join("last_executed")),
        );

        let report = importer.run(start(), end()).await;
        assert_eq!(2, report.accounts.len());
        assert!(report.accounts[0].result.is_err());
        let outcomes = report.accounts[1].result.as_ref().unwrap();
        assert_eq!(1, outcomes.len());
        assert_eq!("groceries", outcomes[0].0.description);
        assert_eq!(ImportOutcome::Created, outcomes[0].1);
        create.assert_async().await;
    }
}

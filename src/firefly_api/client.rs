use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use reqwest::{header, Client, Url};

use super::{payload::TransactionStore, AccessToken, LedgerApi, SubmitError};
use crate::transaction::Transaction;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub struct FireflyClient {
    client: Client,
    transactions_url: Url,
    token: AccessToken,
}

impl FireflyClient {
    pub fn new(host: &str, token: AccessToken) -> Result<Self> {
        // Without the trailing slash, join() would replace a path prefix like `/firefly`
        let base = if host.ends_with('/') {
            Url::parse(host)
        } else {
            Url::parse(&format!("{host}/"))
        }
        .with_context(|| anyhow!("Invalid Firefly host {host}"))?;
        let transactions_url = base
            .join("api/v1/transactions")
            .context("Failed to build transactions url")?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create http client")?;
        Ok(Self {
            client,
            transactions_url,
            token,
        })
    }
}

#[async_trait]
impl LedgerApi for FireflyClient {
    async fn create_transaction(&self, transaction: &Transaction) -> Result<(), SubmitError> {
        let response = self
            .client
            .post(self.transactions_url.clone())
            .bearer_auth(self.token.get())
            .header(header::ACCEPT, "application/json")
            .json(&TransactionStore::single_split(transaction))
            .send()
            .await
            .map_err(|err| SubmitError::ApiFailure(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response
            .text()
            .await
            .map_err(|err| SubmitError::ApiFailure(format!("HTTP {status}: {err}")))?;
        match SubmitError::from_error_body(body) {
            SubmitError::ApiFailure(body) => {
                Err(SubmitError::ApiFailure(format!("HTTP {status}: {body}")))
            }
            SubmitError::Duplicate => Err(SubmitError::Duplicate),
        }
    }
}

use async_trait::async_trait;
use thiserror::Error;

use crate::transaction::Transaction;

mod access_token;
mod client;
mod payload;

pub use access_token::AccessToken;
pub use client::FireflyClient;

/// Firefly III puts this into the error body when `error_if_duplicate_hash` rejects a transaction
pub const DUPLICATE_MARKER: &str = "Duplicate of transaction";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The ledger already has a transaction with the same content hash
    #[error("Duplicate transaction")]
    Duplicate,

    #[error("Ledger API failure: {0}")]
    ApiFailure(String),
}

impl SubmitError {
    pub fn from_error_body(body: String) -> Self {
        if body.contains(DUPLICATE_MARKER) {
            SubmitError::Duplicate
        } else {
            SubmitError::ApiFailure(body)
        }
    }
}

/// Creates transactions in the ledger, one single-split transaction per call.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    async fn create_transaction(&self, transaction: &Transaction) -> Result<(), SubmitError>;
}

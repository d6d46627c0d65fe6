use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::firefly_api::AccessToken;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_WATERMARK_PATH: &str = "last_executed";

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub firefly: FireflyConfig,
    #[serde(default = "default_watermark_path")]
    pub watermark_path: PathBuf,
    #[serde(default)]
    pub banks: Vec<BankConfig>,
}

fn default_watermark_path() -> PathBuf {
    PathBuf::from(DEFAULT_WATERMARK_PATH)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FireflyConfig {
    /// Address of the Firefly III instance, e.g. `https://firefly.example.com`
    pub host: String,
    /// Personal access token for the Firefly III instance
    pub token: AccessToken,
}

/// One configured bank account. Adding a bank means adding a variant here and a
/// [crate::bank_api::TransactionSource] implementation for it.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BankConfig {
    N26(N26Config),
}

impl BankConfig {
    pub fn name(&self) -> &str {
        match self {
            BankConfig::N26(config) => &config.name,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MfaType {
    #[default]
    App,
    Sms,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct N26Config {
    /// Name of the asset account in Firefly III
    pub name: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub mfa_type: MfaType,
    #[serde(default)]
    pub device_token: Option<String>,
    /// If set, login tokens are kept in this directory
    /// so the MFA approval isn't needed on every run
    #[serde(default)]
    pub login_data_store: Option<PathBuf>,
}

impl std::fmt::Debug for N26Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("N26Config")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &"*****")
            .field("mfa_type", &self.mfa_type)
            .field("device_token", &self.device_token)
            .field("login_data_store", &self.login_data_store)
            .finish()
    }
}

impl Config {
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        log::info!("Loading config from {}...", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| anyhow!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| anyhow!("Invalid config file {}", path.display()))?;
        log::info!("Loading config...done");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.firefly.host.trim().is_empty() {
            bail!("firefly.host must not be empty");
        }
        reqwest::Url::parse(&self.firefly.host)
            .with_context(|| anyhow!("firefly.host is not a valid URL: {}", self.firefly.host))?;
        if self.firefly.token.get().trim().is_empty() {
            bail!("firefly.token must not be empty");
        }

        let mut names = HashSet::new();
        for bank in &self.banks {
            let name = bank.name();
            if name.trim().is_empty() {
                bail!("Every bank needs a non-empty name");
            }
            if !names.insert(name) {
                bail!("Bank name '{}' is used more than once", name);
            }
            match bank {
                BankConfig::N26(n26) => {
                    if n26.username.is_empty() || n26.password.is_empty() {
                        bail!("Bank '{}' needs a username and password", name);
                    }
                }
            }
        }
        Ok(())
    }
}

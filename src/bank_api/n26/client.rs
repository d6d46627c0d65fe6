use anyhow::{anyhow, bail, Context as _, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{Duration as ChronoDuration, Utc};
use indicatif::ProgressBar;
use reqwest::{header, Client, Response, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

use super::login_store::{LoginData, LoginStore};
use super::mapper::RawTransaction;
use crate::config::{MfaType, N26Config};
use crate::terminal;

const BASE_URL: &str = "https://api.tech26.de/";
const BASIC_AUTH_CLIENT: &str = "nativeweb:";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const MFA_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MFA_POLL_ATTEMPTS: usize = 60;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

impl From<TokenResponse> for LoginData {
    fn from(response: TokenResponse) -> Self {
        LoginData {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: Utc::now() + ChronoDuration::seconds(response.expires_in),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MfaRequiredResponse {
    mfa_token: String,
}

pub struct N26Client {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
    mfa_type: MfaType,
    device_token: String,
    login_store: Option<LoginStore>,
    login_data: Option<LoginData>,
    mfa_poll_interval: Duration,
}

impl N26Client {
    pub fn new(config: &N26Config) -> Result<Self> {
        Self::with_base_url(config, Url::parse(BASE_URL)?)
    }

    pub fn with_base_url(config: &N26Config, base_url: Url) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create http client")?;
        let device_token = config
            .device_token
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            mfa_type: config.mfa_type,
            device_token,
            login_store: config
                .login_data_store
                .as_deref()
                .map(|directory| LoginStore::new(directory, &config.username)),
            login_data: None,
            mfa_poll_interval: MFA_POLL_INTERVAL,
        })
    }

    #[cfg(test)]
    fn set_mfa_poll_interval(&mut self, interval: Duration) {
        self.mfa_poll_interval = interval;
    }

    /// Raw transactions with `visibleTS` in `[from_ms, to_ms]`, newest first as N26 returns them
    pub async fn get_transactions(
        &mut self,
        from_ms: i64,
        to_ms: i64,
        limit: usize,
    ) -> Result<Vec<RawTransaction>> {
        let access_token = self.access_token().await?;

        log::info!("Requesting transactions for {}...", self.username);
        let response = self
            .client
            .get(self.url("api/smrt/transactions")?)
            .bearer_auth(access_token)
            .query(&[
                ("from", from_ms.to_string()),
                ("to", to_ms.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            // Token got revoked on the server side, don't keep using it
            self.login_data = None;
        }
        let transactions = error_for_status(response)
            .await?
            .json::<Vec<RawTransaction>>()
            .await
            .context("Failed to parse transactions")?;
        log::info!("Requesting transactions...done");

        Ok(transactions)
    }

    async fn access_token(&mut self) -> Result<String> {
        let now = Utc::now();
        if self.login_data.is_none() {
            if let Some(store) = &self.login_store {
                self.login_data = store.load().await?;
            }
        }

        let login_data = match self.login_data.take() {
            Some(login_data) if !login_data.is_expired(now) => return self.keep(login_data),
            Some(expired) => match self.refresh(&expired.refresh_token).await {
                Ok(refreshed) => refreshed,
                Err(err) => {
                    log::warn!("Refreshing the N26 login failed, logging in again: {err:#}");
                    self.login().await?
                }
            },
            None => self.login().await?,
        };

        if let Some(store) = &self.login_store {
            store
                .save(&login_data)
                .await
                .context("Failed to store N26 login data")?;
        }
        self.keep(login_data)
    }

    fn keep(&mut self, login_data: LoginData) -> Result<String> {
        let access_token = login_data.access_token.clone();
        self.login_data = Some(login_data);
        Ok(access_token)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<LoginData> {
        log::info!("Refreshing N26 login for {}...", self.username);
        let response = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;
        let token: TokenResponse = error_for_status(response).await?.json().await?;
        log::info!("Refreshing N26 login...done");
        Ok(token.into())
    }

    async fn login(&self) -> Result<LoginData> {
        log::info!(
            "Authenticating N26 account {}. Please approve the login using the selected MFA type",
            self.username
        );
        let response = self
            .token_request(&[
                ("grant_type", "password"),
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .await?;

        let login_data = if response.status() == StatusCode::FORBIDDEN {
            let mfa: MfaRequiredResponse = response
                .json()
                .await
                .context("Login was rejected without an MFA token")?;
            self.request_mfa_challenge(&mfa.mfa_token).await?;
            self.complete_mfa(&mfa.mfa_token).await?
        } else {
            let token: TokenResponse = error_for_status(response).await?.json().await?;
            token.into()
        };

        log::info!("Authenticating N26 account...done");
        Ok(login_data)
    }

    async fn request_mfa_challenge(&self, mfa_token: &str) -> Result<()> {
        let challenge_type = match self.mfa_type {
            MfaType::App => "oob",
            MfaType::Sms => "otp",
        };
        let response = self
            .client
            .post(self.url("api/mfa/challenge")?)
            .header(header::AUTHORIZATION, basic_auth())
            .header("device-token", &self.device_token)
            .json(&serde_json::json!({
                "challengeType": challenge_type,
                "mfaToken": mfa_token,
            }))
            .send()
            .await?;
        error_for_status(response)
            .await
            .context("Failed to request MFA challenge")?;
        Ok(())
    }

    async fn complete_mfa(&self, mfa_token: &str) -> Result<LoginData> {
        match self.mfa_type {
            MfaType::Sms => {
                let otp = terminal::prompt("N26 SMS code")?;
                let response = self
                    .token_request(&[
                        ("grant_type", "mfa_otp"),
                        ("mfaToken", mfa_token),
                        ("otp", otp.trim()),
                    ])
                    .await?;
                let token: TokenResponse = error_for_status(response)
                    .await
                    .context("SMS code was rejected")?
                    .json()
                    .await?;
                Ok(token.into())
            }
            MfaType::App => {
                let spinner = ProgressBar::new_spinner();
                spinner.set_message("Waiting for approval in the N26 app...");
                spinner.enable_steady_tick(Duration::from_millis(100));
                let result = self.poll_mfa_approval(mfa_token).await;
                spinner.finish_and_clear();
                result
            }
        }
    }

    async fn poll_mfa_approval(&self, mfa_token: &str) -> Result<LoginData> {
        for attempt in 1..=MFA_POLL_ATTEMPTS {
            let response = self
                .token_request(&[("grant_type", "mfa_oob"), ("mfaToken", mfa_token)])
                .await?;
            if response.status().is_success() {
                let token: TokenResponse = response.json().await?;
                return Ok(token.into());
            }
            log::debug!(
                "MFA approval pending (attempt {attempt}/{MFA_POLL_ATTEMPTS}): {}",
                response.status()
            );
            tokio::time::sleep(self.mfa_poll_interval).await;
        }
        bail!("MFA approval wasn't given in time");
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<Response> {
        Ok(self
            .client
            .post(self.url("oauth2/token")?)
            .header(header::AUTHORIZATION, basic_auth())
            .header("device-token", &self.device_token)
            .form(form)
            .send()
            .await?)
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| anyhow!("Failed to build url for {path}"))
    }
}

fn basic_auth() -> String {
    format!("Basic {}", BASE64.encode(BASIC_AUTH_CLIENT))
}

async fn error_for_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    bail!("N26 request to {url} failed with HTTP {status}: {body}")
}

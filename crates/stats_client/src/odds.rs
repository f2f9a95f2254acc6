//! Odds feed — zdroj live a upcoming zápasů.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::error::FetchError;
use crate::retry::{fetch_with_retry, FetchOutcome, RetryConfig};

#[async_trait]
pub trait OddsSource: Send + Sync {
    async fn fetch_live(&self) -> Result<Value>;
    async fn fetch_upcoming(&self) -> Result<Value>;
}

pub struct HttpOddsSource {
    client: reqwest::Client,
    live_url: String,
    upcoming_url: String,
    retry: RetryConfig,
}

impl HttpOddsSource {
    pub fn new(live_url: impl Into<String>, upcoming_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("LiveMatchFeed/1.0")
            .build()?;
        Ok(Self {
            client,
            live_url: live_url.into(),
            upcoming_url: upcoming_url.into(),
            retry: RetryConfig::critical(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn get_json(&self, url: &str) -> Result<FetchOutcome<Value>, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = resp.json().await.map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(FetchOutcome::Fresh(body))
    }

    async fn fetch(&self, op_name: &str, url: &str) -> Result<Value> {
        match fetch_with_retry(op_name, &self.retry, || self.get_json(url)).await? {
            FetchOutcome::Fresh(v) => Ok(v),
            FetchOutcome::Unchanged => bail!("{op_name}: unexpected 304 without validator"),
        }
    }
}

#[async_trait]
impl OddsSource for HttpOddsSource {
    async fn fetch_live(&self) -> Result<Value> {
        self.fetch("odds_live", &self.live_url).await
    }

    async fn fetch_upcoming(&self) -> Result<Value> {
        self.fetch("odds_upcoming", &self.upcoming_url).await
    }
}

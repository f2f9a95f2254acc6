//! reqwest transport pro stats provider.
//!
//! URL: `{base}/{endpoint}/{id}[/{secondary}]`. Provider balí payload do
//! `{"doc":[{"data": ...}]}`, vracíme rovnou `data`. Pro on-demand cally
//! drží klient ETag per URL a posílá `If-None-Match`; 304 = `Unchanged`.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::endpoints::{StatsRequest, StatsTransport};
use crate::error::FetchError;
use crate::retry::FetchOutcome;

pub struct HttpStatsClient {
    client: reqwest::Client,
    base_url: String,
    etags: Mutex<HashMap<String, String>>,
}

impl HttpStatsClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("LiveMatchFeed/1.0")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            etags: Mutex::new(HashMap::new()),
        })
    }

    pub fn url_for(&self, req: &StatsRequest) -> String {
        match &req.secondary {
            Some(s) => format!("{}/{}/{}/{}", self.base_url, req.endpoint.path(), req.id, s),
            None => format!("{}/{}/{}", self.base_url, req.endpoint.path(), req.id),
        }
    }

    /// GET with `If-None-Match` when an ETag for the URL is known.
    pub async fn fetch_conditional(&self, req: &StatsRequest) -> Result<FetchOutcome<Value>, FetchError> {
        let url = self.url_for(req);
        let known = self.etags.lock().get(&url).cloned();

        let mut builder = self.client.get(&url);
        if let Some(tag) = known {
            builder = builder.header(IF_NONE_MATCH, tag);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::Unchanged);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let tag = resp
            .headers()
            .get(ETAG)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        if let Some(tag) = tag {
            self.etags.lock().insert(url, tag);
        }

        let body: Value = resp.json().await.map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(FetchOutcome::Fresh(unwrap_doc(body)))
    }

    pub fn forget_etags(&self) {
        self.etags.lock().clear();
    }
}

#[async_trait]
impl StatsTransport for HttpStatsClient {
    async fn fetch(&self, req: &StatsRequest) -> Result<Value, FetchError> {
        let resp = self.client.get(self.url_for(req)).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body: Value = resp.json().await.map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(unwrap_doc(body))
    }
}

/// `{"doc":[{"data": X}]}` → `X`; jiné tvary beze změny.
pub fn unwrap_doc(body: Value) -> Value {
    match body.pointer("/doc/0/data") {
        Some(data) => data.clone(),
        None => body,
    }
}

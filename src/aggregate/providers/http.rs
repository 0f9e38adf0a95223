// src/aggregate/providers/http.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;

use crate::aggregate::types::{FetchError, Source, SourceProvider};
use crate::session::UserSession;

/// Calls the category endpoints behind the API gateway: `GET <base><path>?user_id=<id>`.
pub struct HttpProvider {
    base: Url,
    client: Client,
}

impl HttpProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .with_context(|| format!("parsing upstream base url {base_url:?}"))?;
        let client = Client::builder()
            .user_agent(concat!("dashboard-aggregator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .build()
            .context("building upstream http client")?;
        Ok(Self { base, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }
}

#[async_trait]
impl SourceProvider for HttpProvider {
    async fn fetch_latest(&self, source: &Source, user: &UserSession) -> Result<Value, FetchError> {
        let url = source.request_url(&self.base, &user.id)?;

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| FetchError::Transport {
            reason: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode {
            reason: e.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

//! Browser host backed by the DevTools HTTP endpoints (`/json/*`).
//!
//! Any Chromium-based browser started with `--remote-debugging-port` exposes
//! these. They list, open, activate and close page targets without a
//! websocket session.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use tab_reconciler::{HostTab, TabError, TabHost, TabId};

#[derive(Debug, Deserialize)]
struct DevtoolsTarget {
    id: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    url: String,
}

pub struct CdpHost {
    client: reqwest::Client,
    base: Url,
    background: bool,
}

impl CdpHost {
    pub fn new(base: Url, background: bool, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base,
            background,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base.as_str().trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, TabError> {
        request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                TabError::Unavailable(e.to_string())
            } else {
                TabError::rejected(operation, e.to_string())
            }
        })
    }
}

async fn rejection(operation: &str, resp: reqwest::Response) -> TabError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    TabError::rejected(operation, format!("{}: {}", status, body.trim()))
}

#[async_trait]
impl TabHost for CdpHost {
    async fn open(&self, url: &str) -> Result<TabId, TabError> {
        let endpoint = format!("{}?{}", self.endpoint("json/new"), url);
        let resp = self.send("open", self.client.put(&endpoint)).await?;
        if !resp.status().is_success() {
            return Err(rejection("open", resp).await);
        }
        let target: DevtoolsTarget = resp
            .json()
            .await
            .map_err(|e| TabError::rejected("open", e.to_string()))?;
        let id = TabId::new(target.id);

        if !self.background {
            let activate = self.endpoint(&format!("json/activate/{}", id));
            if let Err(e) = self.send("activate", self.client.get(&activate)).await {
                debug!("Failed to activate tab {}: {}", id, e);
            }
        }
        Ok(id)
    }

    async fn close(&self, id: &TabId) -> Result<(), TabError> {
        let endpoint = self.endpoint(&format!("json/close/{}", id));
        let resp = self.send("close", self.client.get(&endpoint)).await?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(TabError::NotFound(id.clone())),
            _ => Err(rejection("close", resp).await),
        }
    }

    async fn query(&self) -> Result<Vec<HostTab>, TabError> {
        let resp = self
            .send("query", self.client.get(self.endpoint("json/list")))
            .await?;
        if !resp.status().is_success() {
            return Err(rejection("query", resp).await);
        }
        let targets: Vec<DevtoolsTarget> = resp
            .json()
            .await
            .map_err(|e| TabError::rejected("query", e.to_string()))?;
        Ok(targets
            .into_iter()
            .filter(|t| t.kind == "page")
            .map(|t| HostTab {
                id: TabId::new(t.id),
                url: t.url,
                last_accessed: None,
                audible: false,
            })
            .collect())
    }
}

// src/ingest/providers/http.rs
use std::time::Duration;

use async_trait::async_trait;

use crate::error::IngestError;

pub const USER_AGENT: &str = "chain-map-aggregator/0.1";

/// Retrieves raw payloads for one source: one body per upstream endpoint.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Vec<u8>>, IngestError>;
}

/// Connect/total timeouts for upstream requests.
#[derive(Debug, Clone, Copy)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub total: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            total: Duration::from_secs(15),
        }
    }
}

/// GETs every URL in order; any failure fails the whole fetch so a source is
/// never replaced with a partial district set.
pub struct HttpFetcher {
    client: reqwest::Client,
    urls: Vec<String>,
    query: Vec<(String, String)>,
}

impl HttpFetcher {
    pub fn new<I, S>(urls: I, timeouts: HttpTimeouts) -> Result<Self, IngestError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.total)
            .build()
            .map_err(|e| IngestError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            urls: urls.into_iter().map(Into::into).collect(),
            query: Vec::new(),
        })
    }

    /// Query parameter appended to every request (e.g. an API key).
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, IngestError> {
        let resp = self
            .client
            .get(url)
            .query(&self.query)
            .send()
            .await
            .map_err(|e| IngestError::fetch(format!("{url}: {}", e.without_url())))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(IngestError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| IngestError::fetch(format!("{url}: reading body: {}", e.without_url())))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(IngestError::fetch(format!("{url}: empty body")));
        }
        Ok(body.to_vec())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self) -> Result<Vec<Vec<u8>>, IngestError> {
        let mut out = Vec::with_capacity(self.urls.len());
        for url in &self.urls {
            tracing::debug!(target: "ingest", url = %url, "fetching");
            out.push(self.get(url).await?);
        }
        Ok(out)
    }
}

/// Serves fixed payloads; used for fixtures and offline runs.
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    payloads: Vec<Vec<u8>>,
}

impl StaticFetcher {
    pub fn from_fixture(body: &str) -> Self {
        Self {
            payloads: vec![body.as_bytes().to_vec()],
        }
    }

    pub fn from_payloads(payloads: Vec<Vec<u8>>) -> Self {
        Self { payloads }
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self) -> Result<Vec<Vec<u8>>, IngestError> {
        Ok(self.payloads.clone())
    }
}

/// Registered source that cannot run yet, e.g. Nevada 511 without an API key.
/// Every attempt fails, so the source shows up in the cycle's error list.
#[derive(Debug, Clone)]
pub struct UnconfiguredFetcher {
    reason: String,
}

impl UnconfiguredFetcher {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Fetcher for UnconfiguredFetcher {
    async fn fetch(&self) -> Result<Vec<Vec<u8>>, IngestError> {
        Err(IngestError::Config(self.reason.clone()))
    }
}

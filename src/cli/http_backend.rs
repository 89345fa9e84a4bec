use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{
    ConvertRequest, ConvertResponse, IndexRequest, IndexSummary, SearchRequest, SearchResponse,
};
use crate::server::ErrorBody;

/// HTTP client backend that delegates operations to a running
/// `boolsearch` daemon.
pub struct HttpSearchBackend {
    client: Client,
    base_url: String,
}

impl HttpSearchBackend {
    /// Create a new HTTP backend targeting the given base URL
    /// (e.g. "http://127.0.0.1:7878").
    pub fn new<S: Into<String>>(base_url: S) -> Result<Self> {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, base_url })
    }

    /// `POST /v1/search`
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        self.post_json("/v1/search", request)
    }

    /// `POST /v1/convert`
    pub fn convert(&self, request: &ConvertRequest) -> Result<ConvertResponse> {
        self.post_json("/v1/convert", request)
    }

    /// `POST /v1/documents`, returning the store summary after the write.
    pub fn index(&self, request: &IndexRequest) -> Result<IndexSummary> {
        self.post_json("/v1/documents", request)
    }

    /// `GET /v1/info`
    pub fn info(&self) -> Result<IndexSummary> {
        let url = self.url_for("/v1/info");
        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("failed to send request to {}", url))?;
        decode(&url, response)
    }

    fn post_json<T, R>(&self, path: &str, body: &T) -> Result<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let url = self.url_for(path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .with_context(|| format!("failed to send request to {}", url))?;
        decode(&url, response)
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

// Error responses carry `{"error": ...}`; surface that message instead
// of the bare status code.
fn decode<R: DeserializeOwned>(url: &str, response: Response) -> Result<R> {
    let status = response.status();
    if !status.is_success() {
        let message = response
            .json::<ErrorBody>()
            .map(|body| body.error)
            .unwrap_or_else(|_| status.to_string());
        return Err(anyhow!("server returned {} for {}: {}", status, url, message));
    }

    response
        .json::<R>()
        .context("failed to decode JSON response from server")
}

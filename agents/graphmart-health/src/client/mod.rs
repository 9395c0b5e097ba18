//! HTTP client for the graphmart REST API
//!
//! Implements the fetcher, controller and auth-probe capabilities over
//! basic-authenticated JSON requests.

use crate::config::ClientConfig;
use crate::contracts::*;
use crate::engine::{AuthProbe, GraphmartController, StatusFetcher};
use crate::error::{FetchError, FetchResult};
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};

/// Timeout for the authentication probe
const AUTH_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Graphmart REST API client
pub struct AnzoClient {
    config: ClientConfig,
    base_url: Url,
    client: reqwest::Client,
}

impl AnzoClient {
    /// Create new client
    pub fn new(config: ClientConfig) -> FetchResult<Self> {
        let base_url = Url::parse(&config.base_url())
            .map_err(|e| FetchError::network(format!("Invalid server address: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| FetchError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            base_url,
            client,
        })
    }

    /// `/api/graphmarts/{id}[/{endpoint}]` with the id as one encoded segment
    fn graphmart_url(&self, id: &ArtifactId, endpoint: Option<&str>) -> FetchResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| FetchError::network("Server address cannot be a base URL"))?;
            segments.pop_if_empty().extend(["api", "graphmarts", id.as_str()]);
            if let Some(endpoint) = endpoint {
                segments.push(endpoint);
            }
        }
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url) -> FetchResult<reqwest::Response> {
        tracing::trace!(%method, %url, "Sending request");

        let response = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json")
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        check_status_code(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> FetchResult<T> {
        let response = self.send(Method::GET, url).await?;
        response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))
    }
}

async fn check_status_code(response: reqwest::Response) -> FetchResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(FetchError::Auth(format!("HTTP {}", status)))
    } else {
        Err(FetchError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
}

#[derive(Debug, Deserialize)]
struct TitleBody {
    title: String,
}

#[async_trait]
impl StatusFetcher for AnzoClient {
    async fn status(&self, id: &ArtifactId) -> FetchResult<String> {
        let url = self.graphmart_url(id, Some("status"))?;
        let body: StatusBody = self.get_json(url).await?;
        Ok(short_status_token(&body.status).to_string())
    }

    async fn status_detail(&self, id: &ArtifactId) -> FetchResult<RawStatus> {
        let mut url = self.graphmart_url(id, Some("status"))?;
        url.set_query(Some("detail=true"));
        self.get_json(url).await
    }

    async fn title(&self, id: &ArtifactId) -> FetchResult<String> {
        let url = self.graphmart_url(id, None)?;
        let body: TitleBody = self.get_json(url).await?;
        Ok(body.title)
    }
}

#[async_trait]
impl GraphmartController for AnzoClient {
    async fn reload(&self, id: &ArtifactId) -> FetchResult<()> {
        let url = self.graphmart_url(id, Some("reload"))?;
        tracing::debug!(artifact = %id, "Reloading graphmart");
        self.send(Method::POST, url).await.map(|_| ())
    }

    async fn refresh(&self, id: &ArtifactId) -> FetchResult<()> {
        let url = self.graphmart_url(id, Some("refresh"))?;
        tracing::debug!(artifact = %id, "Refreshing graphmart");
        self.send(Method::POST, url).await.map(|_| ())
    }
}

#[async_trait]
impl AuthProbe for AnzoClient {
    async fn probe_auth(&self) -> FetchResult<Duration> {
        let mut url = self.base_url.clone();
        url.set_path("/api/graphmarts");

        let started = Instant::now();
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .basic_auth(&self.config.username, Some(&self.config.password))
            .timeout(AUTH_PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Network("Authentication request timed out".to_string())
                } else {
                    FetchError::Network(format!("Connection error: {}", e))
                }
            })?;

        check_status_code(response).await?;
        Ok(started.elapsed())
    }
}

//! HTTP client for the upstream chat completion service.

use std::time::Duration;

use async_trait::async_trait;
use http::{header, StatusCode};

use crate::config::UpstreamConfig;
use crate::error::{ClientError, TransportError};
use crate::models::chat::{ChatCompletionRequest, ChatCompletionResponse, UpstreamChatRequest};

/// The upstream seam used by the pipeline.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Forward a normalized request. A single attempt, bounded by `deadline`.
    async fn forward(
        &self,
        req: &ChatCompletionRequest,
        deadline: Duration,
    ) -> Result<ChatCompletionResponse, ClientError>;

    /// `Ok(())` only when the upstream answers its liveness probe with 200.
    async fn probe_health(&self, deadline: Duration) -> Result<(), ClientError>;
}

/// reqwest-backed upstream client. Cloning shares the connection pool.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    base_url: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let http = build_http_client(config)?;
        Ok(Self::with_http_client(config, http))
    }

    /// Use a caller-supplied reqwest client (its timeout/proxy settings win).
    pub fn with_http_client(config: &UpstreamConfig, http: reqwest::Client) -> Self {
        Self {
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            api_key: config
                .api_key
                .as_ref()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => rb.bearer_auth(key),
            None => rb,
        }
    }

    async fn post_chat(&self, req: &ChatCompletionRequest) -> Result<ChatCompletionResponse, ClientError> {
        let body = serde_json::to_vec(&UpstreamChatRequest::from(req))?;
        let rb = self
            .http
            .post(self.url("/api/chat/completions"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(body);

        let resp = self.authorize(rb).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        if status != StatusCode::OK {
            return Err(ClientError::Upstream {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_models(&self) -> Result<(), ClientError> {
        let rb = self.http.get(self.url("/api/models"));
        let resp = self.authorize(rb).send().await?;
        let status = resp.status();
        if status != StatusCode::OK {
            let bytes = resp.bytes().await.unwrap_or_default();
            return Err(ClientError::Upstream {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Upstream for UpstreamClient {
    async fn forward(
        &self,
        req: &ChatCompletionRequest,
        deadline: Duration,
    ) -> Result<ChatCompletionResponse, ClientError> {
        tracing::debug!(
            model = %req.model,
            messages = req.messages.len(),
            has_bearer = self.api_key.is_some(),
            "forwarding chat completion upstream"
        );
        tokio::time::timeout(deadline, self.post_chat(req))
            .await
            .map_err(|_| TransportError::DeadlineExceeded(deadline))?
    }

    async fn probe_health(&self, deadline: Duration) -> Result<(), ClientError> {
        tokio::time::timeout(deadline, self.get_models())
            .await
            .map_err(|_| TransportError::DeadlineExceeded(deadline))?
    }
}

/// Build the pooled reqwest client from upstream settings.
///
/// - `timeout_secs`: overall per-request ceiling
/// - `no_proxy`: disable all proxies (including HTTP(S)_PROXY)
/// - `proxy_url`: proxy for all schemes
pub fn build_http_client(config: &UpstreamConfig) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder().timeout(config.timeout());

    if config.no_proxy {
        builder = builder.no_proxy();
    } else if let Some(url) = config.proxy_url.as_deref().map(str::trim) {
        if !url.is_empty() {
            builder = builder.proxy(reqwest::Proxy::all(url)?);
        }
    }

    // User-Agent for observability
    builder = builder.user_agent(format!("chatbridge/{}", env!("CARGO_PKG_VERSION")));

    builder.build()
}

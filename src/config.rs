use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Process configuration, built once at startup and handed to the client and servers.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    pub grpc_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
            grpc_port: 9090,
        }
    }
}

impl ServerConfig {
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    pub fn grpc_addr(&self) -> String {
        format!("{}:{}", self.host, self.grpc_port)
    }
}

/// Connection settings for the single upstream backend.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Sent as `Authorization: Bearer ...` when non-empty.
    pub api_key: Option<String>,
    /// Overall client timeout; per-call deadlines may be shorter.
    pub timeout_secs: u64,
    /// Route all upstream traffic through this proxy.
    pub proxy_url: Option<String>,
    /// Ignore proxies, including the HTTP(S)_PROXY environment.
    pub no_proxy: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            api_key: None,
            timeout_secs: 30,
            proxy_url: None,
            no_proxy: false,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "json" or "text"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl Config {
    /// Defaults, overlaid with the JSON file at `path` (if given), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load`] with an explicit environment lookup.
    ///
    /// A `path` that does not exist leaves the defaults in place; one that exists
    /// but cannot be read or parsed is an error.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(p) if p.exists() => Self::load_from_file(p)?,
            _ => Self::default(),
        };
        config.apply_env_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file. Missing sections keep their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read config file: {}", path.as_ref().display())
        })?;

        let config: Config =
            serde_json::from_str(&content).with_context(|| "Failed to parse config JSON")?;

        Ok(config)
    }

    /// Apply overrides from an environment lookup. Unparsable numbers are ignored.
    ///
    /// The upstream settings also accept the legacy `OPENWEBUI_BASE_URL`,
    /// `OPENWEBUI_API_KEY` and `OPENWEBUI_TIMEOUT` names; the `UPSTREAM_*` form wins
    /// when both are set.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let get_either = |key: &str, legacy: &str| get(key).or_else(|| get(legacy));

        if let Some(host) = get("HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("HTTP_PORT").and_then(|p| p.parse().ok()) {
            self.server.http_port = port;
        }
        if let Some(port) = get("GRPC_PORT").and_then(|p| p.parse().ok()) {
            self.server.grpc_port = port;
        }
        if let Some(url) = get_either("UPSTREAM_BASE_URL", "OPENWEBUI_BASE_URL") {
            self.upstream.base_url = url;
        }
        if let Some(key) = get_either("UPSTREAM_API_KEY", "OPENWEBUI_API_KEY") {
            self.upstream.api_key = Some(key);
        }
        if let Some(secs) = get_either("UPSTREAM_TIMEOUT_SECONDS", "OPENWEBUI_TIMEOUT")
            .and_then(|s| s.parse().ok())
        {
            self.upstream.timeout_secs = secs;
        }
        if let Some(url) = get("UPSTREAM_PROXY_URL") {
            self.upstream.proxy_url = Some(url);
        }
        if let Some(v) = get("UPSTREAM_NO_PROXY") {
            let v = v.to_ascii_lowercase();
            self.upstream.no_proxy = v == "1" || v == "true" || v == "yes" || v == "on";
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = get("LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let base = self.upstream.base_url.trim();
        if base.is_empty() {
            bail!("upstream.base_url must not be empty");
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            bail!("upstream.base_url must start with http:// or https://, got {base}");
        }
        if self.upstream.timeout_secs == 0 {
            bail!("upstream.timeout_secs must be greater than zero");
        }
        if self.server.http_port == self.server.grpc_port {
            bail!(
                "server.http_port and server.grpc_port must differ (both {})",
                self.server.http_port
            );
        }
        match self.logging.format.as_str() {
            "json" | "text" => Ok(()),
            other => bail!("logging.format must be \"json\" or \"text\", got {other:?}"),
        }
    }
}

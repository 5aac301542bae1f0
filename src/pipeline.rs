//! The validate → merge → forward pipeline shared by both protocol adapters.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::client::Upstream;
use crate::error::BridgeError;
use crate::models::chat::{ChatCompletionRequest, ChatCompletionResponse, HealthState, HealthStatus};
use crate::normalize;

/// Upstream deadline for a chat completion.
pub const CHAT_COMPLETION_DEADLINE: Duration = Duration::from_secs(30);
/// Upstream deadline for a liveness probe.
pub const HEALTH_CHECK_DEADLINE: Duration = Duration::from_secs(5);
/// Version reported by both health surfaces.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared handle to the upstream; cheap to clone into each adapter.
#[derive(Clone)]
pub struct Bridge {
    upstream: Arc<dyn Upstream>,
}

impl Bridge {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }

    /// Validate, merge the persona and forward. No retries.
    pub async fn chat_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, BridgeError> {
        let req = normalize::normalize(req)?;
        let resp = self
            .upstream
            .forward(&req, CHAT_COMPLETION_DEADLINE)
            .await?;
        tracing::debug!(id = %resp.id, model = %resp.model, choices = resp.choices.len(), "chat completion done");
        Ok(resp)
    }

    /// Probe the upstream. Failures are folded into `unhealthy`, never returned.
    pub async fn health(&self) -> HealthStatus {
        let status = match self.upstream.probe_health(HEALTH_CHECK_DEADLINE).await {
            Ok(()) => HealthState::Healthy,
            Err(e) => {
                tracing::warn!(error = %e, kind = e.kind(), "upstream health check failed");
                HealthState::Unhealthy
            }
        };
        HealthStatus {
            status,
            version: VERSION.to_string(),
            timestamp: Some(Utc::now()),
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge").finish_non_exhaustive()
    }
}

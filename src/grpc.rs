//! gRPC surface (`bridge.v1.ChatBridge`) over the shared pipeline.

use std::future::Future;
use std::net::SocketAddr;

use tonic::transport::Server;
use tonic::{Request, Response, Status};

use crate::error::{BridgeError, ValidationError};
use crate::models::chat::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice, HealthStatus, Usage,
};
use crate::normalize;
use crate::pipeline::Bridge;

pub mod proto {
    #![allow(clippy::pedantic)]
    #![allow(clippy::derive_partial_eq_without_eq)]
    tonic::include_proto!("bridge.v1");
}

use proto::chat_bridge_server::{ChatBridge, ChatBridgeServer};

pub struct ChatBridgeService {
    bridge: Bridge,
}

impl ChatBridgeService {
    pub fn new(bridge: Bridge) -> Self {
        Self { bridge }
    }

    pub fn into_server(self) -> ChatBridgeServer<Self> {
        ChatBridgeServer::new(self)
    }
}

#[tonic::async_trait]
impl ChatBridge for ChatBridgeService {
    /// Upstream unhealthiness is a successful response with `status: "unhealthy"`.
    async fn health_check(
        &self,
        _request: Request<proto::HealthCheckRequest>,
    ) -> Result<Response<proto::HealthCheckResponse>, Status> {
        let health = self.bridge.health().await;
        Ok(Response::new(health.into()))
    }

    async fn chat_completion(
        &self,
        request: Request<proto::ChatCompletionRequest>,
    ) -> Result<Response<proto::ChatCompletionResponse>, Status> {
        let req = ChatCompletionRequest::try_from(request.into_inner()).map_err(invalid_request)?;

        match self.bridge.chat_completion(req).await {
            Ok(resp) => Ok(Response::new(resp.into())),
            Err(BridgeError::Invalid(e)) => Err(invalid_request(e)),
            Err(BridgeError::Upstream(e)) => {
                tracing::error!(error = %e, kind = e.kind(), "gRPC chat completion failed");
                Err(Status::internal(format!(
                    "failed to process chat completion: {e}"
                )))
            }
        }
    }
}

fn invalid_request(e: ValidationError) -> Status {
    tracing::warn!(error = %e, "gRPC request rejected");
    Status::invalid_argument(format!("invalid request: {e}"))
}

/// Serve the gRPC surface on `addr` until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, bridge: Bridge, shutdown: F) -> Result<(), tonic::transport::Error>
where
    F: Future<Output = ()>,
{
    Server::builder()
        .add_service(ChatBridgeService::new(bridge).into_server())
        .serve_with_shutdown(addr, shutdown)
        .await
}

// ============================================================================
// Conversions between protobuf and canonical models
// ============================================================================

fn saturating_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

fn clamp_u32(v: i32) -> u32 {
    u32::try_from(v).unwrap_or(0)
}

impl From<proto::ChatMessage> for ChatMessage {
    fn from(m: proto::ChatMessage) -> Self {
        Self {
            role: m.role,
            content: m.content,
        }
    }
}

impl From<ChatMessage> for proto::ChatMessage {
    fn from(m: ChatMessage) -> Self {
        Self {
            role: m.role,
            content: m.content,
        }
    }
}

impl TryFrom<proto::ChatCompletionRequest> for ChatCompletionRequest {
    type Error = ValidationError;

    /// Presence of `temperature`, `max_tokens` and `stream` is carried over as-is.
    ///
    /// The required fields are validated before the `max_tokens` range check,
    /// so a request with several defects reports the same first violation as REST.
    fn try_from(req: proto::ChatCompletionRequest) -> Result<Self, Self::Error> {
        let raw_max_tokens = req.max_tokens;
        let mut out = Self {
            model: req.model,
            messages: req.messages.into_iter().map(ChatMessage::from).collect(),
            temperature: req.temperature,
            max_tokens: None,
            stream: req.stream,
            persona_prompt: req.persona_prompt,
        };
        normalize::validate(&out)?;

        out.max_tokens = raw_max_tokens
            .map(|n| {
                u32::try_from(n).map_err(|_| {
                    ValidationError::new(format!("max_tokens must be non-negative, got {n}"))
                })
            })
            .transpose()?;
        Ok(out)
    }
}

impl From<ChatCompletionRequest> for proto::ChatCompletionRequest {
    fn from(req: ChatCompletionRequest) -> Self {
        Self {
            model: req.model,
            messages: req.messages.into_iter().map(Into::into).collect(),
            temperature: req.temperature,
            max_tokens: req.max_tokens.map(saturating_i32),
            stream: req.stream,
            persona_prompt: req.persona_prompt,
        }
    }
}

impl From<ChatCompletionResponse> for proto::ChatCompletionResponse {
    fn from(resp: ChatCompletionResponse) -> Self {
        Self {
            id: resp.id,
            object: resp.object,
            created: resp.created,
            model: resp.model,
            choices: resp
                .choices
                .into_iter()
                .map(|c| proto::Choice {
                    index: saturating_i32(c.index),
                    message: Some(c.message.into()),
                    finish_reason: c.finish_reason,
                })
                .collect(),
            usage: Some(proto::Usage {
                prompt_tokens: saturating_i32(resp.usage.prompt_tokens),
                completion_tokens: saturating_i32(resp.usage.completion_tokens),
                total_tokens: saturating_i32(resp.usage.total_tokens),
            }),
        }
    }
}

impl From<proto::ChatCompletionResponse> for ChatCompletionResponse {
    fn from(resp: proto::ChatCompletionResponse) -> Self {
        let usage = resp.usage.unwrap_or_default();
        Self {
            id: resp.id,
            object: resp.object,
            created: resp.created,
            model: resp.model,
            choices: resp
                .choices
                .into_iter()
                .map(|c| Choice {
                    index: clamp_u32(c.index),
                    message: c.message.map(ChatMessage::from).unwrap_or(ChatMessage {
                        role: String::new(),
                        content: String::new(),
                    }),
                    finish_reason: c.finish_reason,
                })
                .collect(),
            usage: Usage {
                prompt_tokens: clamp_u32(usage.prompt_tokens),
                completion_tokens: clamp_u32(usage.completion_tokens),
                total_tokens: clamp_u32(usage.total_tokens),
            },
        }
    }
}

impl From<HealthStatus> for proto::HealthCheckResponse {
    fn from(h: HealthStatus) -> Self {
        Self {
            status: h.status.as_str().to_string(),
            version: h.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proto_request() -> proto::ChatCompletionRequest {
        proto::ChatCompletionRequest {
            model: "test-model".to_string(),
            messages: vec![proto::ChatMessage {
                role: "user".to_string(),
                content: "Hello".to_string(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn absent_optionals_stay_absent() {
        let req = ChatCompletionRequest::try_from(proto_request()).unwrap();
        assert_eq!(req.temperature, None);
        assert_eq!(req.max_tokens, None);
        assert_eq!(req.stream, None);
    }

    #[test]
    fn zero_valued_optionals_stay_present() {
        let mut p = proto_request();
        p.temperature = Some(0.0);
        p.max_tokens = Some(0);
        p.stream = Some(false);

        let req = ChatCompletionRequest::try_from(p).unwrap();
        assert_eq!(req.temperature, Some(0.0));
        assert_eq!(req.max_tokens, Some(0));
        assert_eq!(req.stream, Some(false));

        let back = proto::ChatCompletionRequest::from(req);
        assert_eq!(back.temperature, Some(0.0));
        assert_eq!(back.max_tokens, Some(0));
        assert_eq!(back.stream, Some(false));
    }

    #[test]
    fn negative_max_tokens_is_invalid() {
        let mut p = proto_request();
        p.max_tokens = Some(-1);
        let err = ChatCompletionRequest::try_from(p).unwrap_err();
        assert!(err.to_string().contains("max_tokens"));
    }

    #[test]
    fn required_fields_reported_before_max_tokens() {
        let p = proto::ChatCompletionRequest {
            max_tokens: Some(-1),
            ..Default::default()
        };
        let err = ChatCompletionRequest::try_from(p).unwrap_err();
        assert_eq!(err.to_string(), "model required");

        let mut p = proto_request();
        p.messages.clear();
        p.max_tokens = Some(-1);
        let err = ChatCompletionRequest::try_from(p).unwrap_err();
        assert_eq!(err.to_string(), "messages required");
    }

    #[test]
    fn response_conversion_fills_usage_and_messages() {
        let resp = ChatCompletionResponse {
            id: "id-1".to_string(),
            object: "chat.completion".to_string(),
            created: 1_700_000_000,
            model: "m".to_string(),
            choices: vec![Choice {
                index: 0,
                message: ChatMessage::new(crate::models::Role::Assistant, "hi"),
                finish_reason: "stop".to_string(),
            }],
            usage: Usage {
                prompt_tokens: 3,
                completion_tokens: 1,
                total_tokens: 4,
            },
        };

        let p = proto::ChatCompletionResponse::from(resp.clone());
        assert_eq!(p.usage.as_ref().map(|u| u.total_tokens), Some(4));
        assert_eq!(
            p.choices[0].message.as_ref().map(|m| m.content.as_str()),
            Some("hi")
        );
        assert_eq!(ChatCompletionResponse::from(p), resp);
    }
}

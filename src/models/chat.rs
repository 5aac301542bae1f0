use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, skip_serializing_none, DefaultOnNull};

/// Chat message role.
///
/// Lowercase on the wire: "system" | "user" | "assistant".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single conversation message.
///
/// `role` is kept as a string: an absent or empty role must reach validation
/// (and be reported with its index) instead of failing body decoding. An
/// explicit `null` decodes the same as a missing key.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub role: String,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role: role.as_str().to_string(),
            content: content.into(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System.as_str()
    }
}

/// Canonical chat completion request shared by the REST and gRPC surfaces.
///
/// Optional sampling fields stay `Option` end to end so that "absent" and
/// "present but zero" are never conflated. A `null` model or message list is
/// left for validation to report.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub model: String,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub messages: Vec<ChatMessage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Persona directive folded into the system message before forwarding.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub persona_prompt: String,
}

/// Body sent upstream. Borrowed from a normalized request; carries no persona field.
#[skip_serializing_none]
#[derive(Debug, Serialize)]
pub struct UpstreamChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub stream: Option<bool>,
}

impl<'a> From<&'a ChatCompletionRequest> for UpstreamChatRequest<'a> {
    fn from(req: &'a ChatCompletionRequest) -> Self {
        Self {
            model: &req.model,
            messages: &req.messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            stream: req.stream,
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

// Upstreams commonly send `null` for fields they have nothing to say about
// (`finish_reason` mid-stream, `usage` when not tracked); those decode as zero values.

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub finish_reason: String,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub prompt_tokens: u32,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub completion_tokens: u32,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub total_tokens: u32,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub object: String, // "chat.completion"
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub created: i64,
    pub model: String,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub choices: Vec<Choice>,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub usage: Usage,
}

// ============================================================================
// Health and errors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthState::Healthy)
    }
}

/// Aggregated upstream health, reported identically by both surfaces.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: HealthState,
    pub version: String,
    #[serde(rename = "time", default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// JSON error body returned by the REST surface.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<u16>,
}

#![allow(dead_code)]

pub mod upstream_stub;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chatbridge::chat::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice, Role, Usage,
};
use chatbridge::{Bridge, ClientError, TransportError, Upstream};
use http::StatusCode;

/// What the scripted upstream answers to `forward`.
#[derive(Clone)]
pub enum ChatScript {
    Respond(ChatCompletionResponse),
    Status(StatusCode, &'static str),
    Timeout,
}

/// In-memory `Upstream` that records every forwarded request.
pub struct ScriptedUpstream {
    chat: Mutex<ChatScript>,
    healthy: AtomicBool,
    forwarded: Mutex<Vec<ChatCompletionRequest>>,
    probes: AtomicUsize,
}

impl ScriptedUpstream {
    pub fn new(chat: ChatScript, healthy: bool) -> Arc<Self> {
        Arc::new(Self {
            chat: Mutex::new(chat),
            healthy: AtomicBool::new(healthy),
            forwarded: Mutex::new(Vec::new()),
            probes: AtomicUsize::new(0),
        })
    }

    pub fn responding() -> Arc<Self> {
        Self::new(ChatScript::Respond(sample_response()), true)
    }

    pub fn set_chat(&self, script: ChatScript) {
        *self.chat.lock().unwrap() = script;
    }

    pub fn forwarded(&self) -> Vec<ChatCompletionRequest> {
        self.forwarded.lock().unwrap().clone()
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Upstream for ScriptedUpstream {
    async fn forward(
        &self,
        req: &ChatCompletionRequest,
        deadline: Duration,
    ) -> Result<ChatCompletionResponse, ClientError> {
        self.forwarded.lock().unwrap().push(req.clone());
        let script = self.chat.lock().unwrap().clone();
        match script {
            ChatScript::Respond(resp) => Ok(resp),
            ChatScript::Status(status, body) => Err(ClientError::Upstream {
                status,
                body: body.to_string(),
            }),
            ChatScript::Timeout => Err(TransportError::DeadlineExceeded(deadline).into()),
        }
    }

    async fn probe_health(&self, deadline: Duration) -> Result<(), ClientError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::DeadlineExceeded(deadline).into())
        }
    }
}

pub fn bridge_for(upstream: &Arc<ScriptedUpstream>) -> Bridge {
    Bridge::new(upstream.clone())
}

pub fn sample_response() -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: "test-id".to_string(),
        object: "chat.completion".to_string(),
        created: 1_700_000_000,
        model: "test-model".to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChatMessage::new(Role::Assistant, "Hello! How can I help you?"),
            finish_reason: "stop".to_string(),
        }],
        usage: Usage {
            prompt_tokens: 10,
            completion_tokens: 8,
            total_tokens: 18,
        },
    }
}

/// Minimal chat request body as a REST client would send it.
pub fn sample_chat_json() -> serde_json::Value {
    serde_json::json!({
        "model": "test-model",
        "messages": [
            {"role": "user", "content": "Hello"}
        ]
    })
}

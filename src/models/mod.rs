//! Data models shared by both protocol surfaces.
//!
//! - `chat`: canonical chat completion request/response, health and error bodies.
//!
//! Protocol-native gRPC messages are generated from `proto/bridge.proto` and live in
//! `crate::grpc::proto`; conversions to and from these models are in `crate::grpc`.

pub mod chat;

pub use chat::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice, ErrorEnvelope,
    HealthState, HealthStatus, Role, Usage,
};

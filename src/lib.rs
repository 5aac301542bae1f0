#![forbid(unsafe_code)]
#![doc = r#"
Chatbridge

Expose a single upstream chat-completion service over REST/JSON and gRPC, with one
shared validation and persona-merge pipeline in front of it.

Crate highlights
- Library: pure request normalization via `normalize::validate` / `normalize::merge_persona`.
- REST server (in `rest`): `GET /health`, `POST /api/chat/completions`.
- gRPC server (in `grpc`): `bridge.v1.ChatBridge` with `HealthCheck` and `ChatCompletion`.
- Upstream client (in `client`): `POST /api/chat/completions`, `GET /api/models`.

Modules
- `models`: canonical request/response, health and error bodies.
- `normalize`: validation and persona merge.
- `pipeline`: the shared validate → merge → forward flow and health aggregation.
- `client`: reqwest-backed `Upstream` implementation.
- `rest` / `grpc`: protocol adapters.
- `config`: startup configuration (JSON file + environment).
- `util`: env file loading and tracing setup.
"#]

pub mod client;
pub mod config;
pub mod error;
pub mod grpc;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod rest;
pub mod util;

pub use crate::client::{Upstream, UpstreamClient};
pub use crate::config::Config;
pub use crate::error::{BridgeError, ClientError, TransportError, ValidationError};
pub use crate::normalize::{merge_persona, validate};
pub use crate::pipeline::Bridge;

// Re-export the model namespace for convenience (downstream users can do `use chatbridge::chat`).
pub use crate::models::chat;

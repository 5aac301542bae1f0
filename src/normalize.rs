//! Request validation and persona merging.
//!
//! Both functions are pure and shared by the REST and gRPC adapters. Validation
//! always runs first, on the request exactly as it was received.

use crate::error::ValidationError;
use crate::models::chat::{ChatCompletionRequest, ChatMessage, Role};

/// Check the request for the fields every upstream call needs.
///
/// Short-circuits at the first violation: model, then the message list, then
/// each message in order (role before content).
pub fn validate(req: &ChatCompletionRequest) -> Result<(), ValidationError> {
    if req.model.is_empty() {
        return Err(ValidationError::new("model required"));
    }
    if req.messages.is_empty() {
        return Err(ValidationError::new("messages required"));
    }
    for (i, msg) in req.messages.iter().enumerate() {
        if msg.role.is_empty() {
            return Err(ValidationError::new(format!("message[{i}]: role required")));
        }
        if msg.content.is_empty() {
            return Err(ValidationError::new(format!(
                "message[{i}]: content required"
            )));
        }
    }
    Ok(())
}

/// Fold `persona_prompt` into the message sequence and clear it.
///
/// The persona is placed in front of the first system message's content,
/// separated by a blank line; later system messages are left alone. Without a
/// system message a new one is inserted at the front. The request is taken by
/// value, so the caller's copy can never observe the rewrite.
pub fn merge_persona(mut req: ChatCompletionRequest) -> ChatCompletionRequest {
    let persona = std::mem::take(&mut req.persona_prompt);
    if persona.is_empty() {
        return req;
    }

    match req.messages.iter_mut().find(|m| m.is_system()) {
        Some(system) => {
            system.content = format!("{persona}\n\n{}", system.content);
        }
        None => {
            req.messages.insert(0, ChatMessage::new(Role::System, persona));
        }
    }
    req
}

/// Validate, then merge. The form both adapters use.
pub fn normalize(req: ChatCompletionRequest) -> Result<ChatCompletionRequest, ValidationError> {
    validate(&req)?;
    Ok(merge_persona(req))
}

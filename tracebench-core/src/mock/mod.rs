//! Deterministic model stand-in
//!
//! [`MockModel`] returns scripted responses so an agent can be driven
//! reproducibly without a real provider. Responses come from a FIFO queue,
//! then priority-ordered rules, then a default.

mod agent;
mod message;
mod resolver;
mod response;
mod stream;

pub use agent::{MockAgent, ToolHandler, DEFAULT_MAX_TURNS};
pub use message::{last_user_text, ChatMessage, Role, ToolDefinition};
pub use resolver::{
    CallLogEntry, DynamicResponder, MockModel, Responder, ResponseRule, RulePredicate,
};
pub use response::{FinishReason, MockResponse, MockToolCall};
pub use stream::{collect_stream_text, response_events, CollectedStream, StreamEvent};

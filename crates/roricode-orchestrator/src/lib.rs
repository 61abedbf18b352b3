//! Orchestration core for RoriCode.
//!
//! The pieces, leaf first:
//! - [`bus`]: bounded, typed UI/core channels guarded by a circuit breaker
//! - [`state`]: the conversation log and its atomic transitions
//! - [`tools`]: the tool contract, registry and builtin tools
//! - [`confirmation`]: the human-in-the-loop confirmation rendezvous
//! - [`service`]: the completion/tool loop that ties everything together

pub mod bus;
pub mod confirmation;
pub mod error;
pub mod prompt;
pub mod service;
pub mod state;
pub mod tools;

pub use bus::{
    BusError, CircuitBreaker, CircuitState, ConfirmationRequest, CoreEvent, EventBus, UiEvent,
};
pub use confirmation::ConfirmationBroker;
pub use error::{OrchestrationError, Result};
pub use service::{ChatService, ServiceConfig};
pub use state::{ConversationState, DisplayKind, DisplayMessage, UiSnapshot};
pub use tools::{
    Confirmator, Tool, ToolArguments, ToolCall, ToolContext, ToolError, ToolParameters,
    ToolRegistry, ToolResult, register_builtin_tools,
};

//! Completion API abstraction for RoriCode.
//!
//! This crate defines the wire-neutral message types exchanged with a remote
//! chat-completion service and the `CompletionClient` trait the orchestrator
//! drives. Concrete clients live in `roricode-models`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Represents an error that can occur when talking to a completion API.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelError {
    /// An error occurred during the API request (e.g., network issues, invalid request).
    #[error("Request Error: {0}")]
    RequestError(String),

    /// The service answered with a non-success status.
    #[error("Model Response Error: {0}")]
    ModelResponseError(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization Error: {0}")]
    SerializationError(String),

    /// Provider quota exceeded or rate limit hit.
    #[error("Provider '{provider}' quota exceeded{}", message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
    QuotaExceeded {
        /// The provider name (e.g., "openai").
        provider: String,
        /// Optional error message from the provider.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Other unexpected errors.
    #[error("Other Model Error: {0}")]
    Other(String),
}

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    /// Returns the wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool invocation requested by the model.
///
/// Emitted by the completion API and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRef {
    /// Opaque correlation id assigned by the API.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Raw JSON arguments exactly as the model produced them.
    pub arguments_json: String,
}

impl ToolCallRef {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments_json: impl Into<String>,
    ) -> Self {
        Self { id: id.into(), name: name.into(), arguments_json: arguments_json.into() }
    }
}

/// Represents a message in a conversation with a chat model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender.
    pub role: Role,
    /// The content of the message.
    pub content: String,
    /// For `tool` messages: the id of the call this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// For `tool` messages: the name of the tool that produced the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// For `assistant` messages: the tool calls requested alongside the text.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRef>,
}

impl ChatMessage {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_name: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    /// Creates an assistant message carrying both text and tool calls.
    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCallRef>) -> Self {
        Self { tool_calls, ..Self::plain(Role::Assistant, content) }
    }

    /// Creates a tool-result message answering `call_id`.
    pub fn tool(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            tool_name: Some(tool_name.into()),
            ..Self::plain(Role::Tool, content)
        }
    }
}

/// Description of a tool as advertised to the completion API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name used in function calls.
    pub name: String,
    /// Human readable description shown to the model.
    pub description: String,
    /// JSON schema of the argument object (`{"type":"object", ...}`).
    pub parameters: Value,
}

impl ToolSchema {
    /// Renders the schema as an OpenAI style function definition.
    pub fn to_function_definition(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// The outcome of one completion call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Assistant text, possibly empty.
    pub content: String,
    /// Tool calls requested by the model.
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRef>,
    /// Optional finish reason reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl CompletionResponse {
    /// Creates a text-only response.
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), ..Self::default() }
    }

    /// Creates a response that requests tool calls.
    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCallRef>) -> Self {
        Self { content: content.into(), tool_calls, finish_reason: Some("tool_calls".to_string()) }
    }

    /// Returns true if the model asked for at least one tool call.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A stateless chat-completion client.
///
/// All clients must be `Send + Sync` so the orchestrator can share them across tasks.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends the full conversation plus the available tool schemas and returns the reply.
    ///
    /// # Errors
    /// Returns a `ModelError` on transport failure or a non-success API answer.
    async fn create_completion(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
    ) -> Result<CompletionResponse, ModelError>;

    /// Returns the model identifier used by this client.
    fn model_id(&self) -> &str;
}

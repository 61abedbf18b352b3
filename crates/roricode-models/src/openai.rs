//! OpenAI compatible chat-completions client.
//!
//! Speaks the `/chat/completions` function-calling dialect, which is also
//! served by most self-hosted and third-party gateways.

use async_trait::async_trait;
use reqwest::Client;
use roricode_abstraction::{
    ChatMessage, CompletionClient, CompletionResponse, ModelError, Role, ToolCallRef, ToolSchema,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

/// Endpoint used when a profile does not set a base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: OpenAIFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

/// Client for an OpenAI compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    /// The model ID (e.g., "gpt-4o-mini").
    model_id: String,
    /// The API key for authentication.
    api_key: String,
    /// Base URL without the trailing `/chat/completions`.
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl OpenAIClient {
    /// Creates a client for the public OpenAI endpoint.
    #[must_use]
    pub fn new(model_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
        }
    }

    /// Points the client at a different endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn to_wire(message: &ChatMessage) -> OpenAIMessage {
        let tool_calls = (!message.tool_calls.is_empty()).then(|| {
            message
                .tool_calls
                .iter()
                .map(|call| OpenAIToolCall {
                    id: call.id.clone(),
                    call_type: function_type(),
                    function: OpenAIFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments_json.clone(),
                    },
                })
                .collect()
        });

        // Assistant turns that only call tools carry a null content.
        let content = if message.role == Role::Assistant
            && message.content.is_empty()
            && tool_calls.is_some()
        {
            None
        } else {
            Some(message.content.clone())
        };

        OpenAIMessage {
            role: message.role.as_str(),
            content,
            tool_calls,
            tool_call_id: message.tool_call_id.clone(),
        }
    }

    fn from_wire(response: OpenAIResponse) -> CompletionResponse {
        let Some(choice) = response.choices.into_iter().next() else {
            return CompletionResponse::default();
        };

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCallRef::new(tc.id, tc.function.name, tc.function.arguments))
            .collect();

        CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            finish_reason: choice.finish_reason,
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAIClient {
    async fn create_completion(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
    ) -> Result<CompletionResponse, ModelError> {
        debug!(
            model_id = %self.model_id,
            message_count = messages.len(),
            tool_count = tools.len(),
            "OpenAIClient creating chat completion"
        );

        let url = format!("{}/chat/completions", self.base_url);

        let request_body = OpenAIRequest {
            model: self.model_id.clone(),
            messages: messages.iter().map(Self::to_wire).collect(),
            tools: (!tools.is_empty())
                .then(|| tools.iter().map(ToolSchema::to_function_definition).collect()),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send request to completion API");
                ModelError::RequestError(format!("Network error: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                status = %status,
                error = %error_text,
                "Completion API returned error status"
            );

            if status.as_u16() == 402 || status.as_u16() == 429 {
                return Err(ModelError::QuotaExceeded {
                    provider: "openai".to_string(),
                    message: Some(error_text),
                });
            }

            return Err(ModelError::ModelResponseError(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let openai_response: OpenAIResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse completion API response");
            ModelError::SerializationError(format!("Failed to parse response: {}", e))
        })?;

        let completion = Self::from_wire(openai_response);
        debug!(
            content_len = completion.content.len(),
            tool_calls = completion.tool_calls.len(),
            finish_reason = ?completion.finish_reason,
            "Completion received"
        );
        Ok(completion)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_dir_schema() -> ToolSchema {
        ToolSchema {
            name: "list_dir".to_string(),
            description: "List a directory".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {"path": {"type": "string", "description": "Directory"}},
                "required": ["path"]
            }),
        }
    }

    #[test]
    fn test_wire_assistant_tool_call_has_null_content() {
        let msg = ChatMessage::assistant(
            "",
            vec![ToolCallRef::new("call_1", "list_dir", r#"{"path":"."}"#)],
        );
        let wire = serde_json::to_value(OpenAIClient::to_wire(&msg)).unwrap();
        assert_eq!(wire["role"], "assistant");
        assert!(wire.get("content").is_none());
        assert_eq!(wire["tool_calls"][0]["type"], "function");
        assert_eq!(wire["tool_calls"][0]["function"]["arguments"], r#"{"path":"."}"#);
    }

    #[test]
    fn test_wire_tool_message_keeps_call_id() {
        let msg = ChatMessage::tool("call_1", "list_dir", "[]");
        let wire = serde_json::to_value(OpenAIClient::to_wire(&msg)).unwrap();
        assert_eq!(wire["role"], "tool");
        assert_eq!(wire["tool_call_id"], "call_1");
        assert_eq!(wire["content"], "[]");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = OpenAIClient::new("m", "k").with_base_url("http://localhost:1234/v1/");
        assert_eq!(client.base_url(), "http://localhost:1234/v1");
    }

    #[tokio::test]
    async fn test_tool_call_response_parsed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_abc",
                            "type": "function",
                            "function": {"name": "list_dir", "arguments": "{\"path\":\".\"}"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            }"#,
            )
            .create_async()
            .await;

        let client = OpenAIClient::new("test-model", "test-key")
            .with_base_url(format!("{}/v1", server.url()));
        let response = client
            .create_completion(&[ChatMessage::user("list files")], &[list_dir_schema()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(response.content.is_empty());
        assert_eq!(response.tool_calls, vec![ToolCallRef::new("call_abc", "list_dir", r#"{"path":"."}"#)]);
        assert_eq!(response.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[tokio::test]
    async fn test_request_carries_tools() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "test-model",
                "tools": [{"type": "function", "function": {"name": "list_dir"}}]
            })))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"ok"},"finish_reason":"stop"}]}"#)
            .create_async()
            .await;

        let client = OpenAIClient::new("test-model", "k").with_base_url(format!("{}/v1", server.url()));
        let response = client
            .create_completion(&[ChatMessage::user("hi")], &[list_dir_schema()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.content, "ok");
        assert!(!response.has_tool_calls());
    }

    #[tokio::test]
    async fn test_empty_choices_is_empty_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let client = OpenAIClient::new("m", "k").with_base_url(format!("{}/v1", server.url()));
        let response = client.create_completion(&[ChatMessage::user("hi")], &[]).await.unwrap();
        assert_eq!(response, CompletionResponse::default());
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_quota_exceeded() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_body("rate limit reached")
            .create_async()
            .await;

        let client = OpenAIClient::new("m", "k").with_base_url(format!("{}/v1", server.url()));
        let err = client.create_completion(&[ChatMessage::user("hi")], &[]).await.unwrap_err();
        assert!(matches!(err, ModelError::QuotaExceeded { .. }));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_response_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = OpenAIClient::new("m", "k").with_base_url(format!("{}/v1", server.url()));
        let err = client.create_completion(&[ChatMessage::user("hi")], &[]).await.unwrap_err();
        match err {
            ModelError::ModelResponseError(msg) => assert!(msg.contains("boom")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

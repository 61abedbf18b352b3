// Tool abstractions for orchestration
//
// A tool is a capability the model can invoke. This module defines the tool
// contract, the parameter schema builder, validated arguments and results.

use async_trait::async_trait;
use roricode_abstraction::ToolSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors a tool can report. They end up in `ToolResult::error`, never abort a round.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments failed JSON parsing or schema checks
    #[error("Invalid arguments for '{tool}': {reason}")]
    InvalidArguments {
        /// Tool name
        tool: String,
        /// What was wrong
        reason: String,
    },

    /// No tool registered under that name
    #[error("tool '{0}' not found")]
    NotFound(String),

    /// The user declined the operation
    #[error("operation cancelled by user")]
    Denied,

    /// The tool did not finish within its timeout
    #[error("timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    /// The service shut down while the tool was running
    #[error("cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other execution failure
    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    pub fn invalid(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments { tool: tool.into(), reason: reason.into() }
    }
}

/// Property schema inside a tool's parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolPropertySchema {
    /// JSON type ("string", "integer", "boolean", "object")
    #[serde(rename = "type")]
    pub property_type: String,
    /// Description shown to the model
    pub description: String,
    /// Allowed values, if restricted
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

/// Tool parameters schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameters {
    /// Type (always "object" for function parameters)
    #[serde(rename = "type")]
    pub param_type: String,
    /// Property definitions
    pub properties: BTreeMap<String, ToolPropertySchema>,
    /// Required property names
    pub required: Vec<String>,
}

impl Default for ToolParameters {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolParameters {
    /// Create an empty object schema
    pub fn new() -> Self {
        Self { param_type: "object".to_string(), properties: BTreeMap::new(), required: Vec::new() }
    }

    /// Add a property to the schema
    #[must_use]
    pub fn add_property(
        mut self,
        name: impl Into<String>,
        property_type: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let name = name.into();
        self.properties.insert(
            name.clone(),
            ToolPropertySchema {
                property_type: property_type.into(),
                description: description.into(),
                enum_values: None,
            },
        );
        if required {
            self.required.push(name);
        }
        self
    }

    /// Add a string property restricted to `values`
    #[must_use]
    pub fn add_enum_property(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: &[&str],
        required: bool,
    ) -> Self {
        let name = name.into();
        let mut params = self.add_property(name.clone(), "string", description, required);
        if let Some(prop) = params.properties.get_mut(&name) {
            prop.enum_values = Some(values.iter().map(|v| (*v).to_string()).collect());
        }
        params
    }

    /// JSON schema value
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({"type": "object"}))
    }
}

/// Arguments that passed JSON parsing and the required-parameter check
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArguments {
    tool: String,
    args: Map<String, Value>,
}

impl ToolArguments {
    /// Wraps an already parsed object
    pub fn new(tool: impl Into<String>, args: Map<String, Value>) -> Self {
        Self { tool: tool.into(), args }
    }

    /// Parses raw model output into an argument object and checks `required`.
    ///
    /// An empty string counts as `{}`.
    pub fn from_json(tool: &str, raw: &str, required: &[String]) -> Result<Self, ToolError> {
        let raw = raw.trim();
        let value: Value = if raw.is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(raw).map_err(|e| ToolError::invalid(tool, e.to_string()))?
        };

        let Value::Object(args) = value else {
            return Err(ToolError::invalid(tool, "arguments must be a JSON object"));
        };

        if let Some(missing) =
            required.iter().find(|name| args.get(name.as_str()).is_none_or(Value::is_null))
        {
            return Err(ToolError::invalid(tool, format!("missing required parameter '{missing}'")));
        }

        Ok(Self::new(tool, args))
    }

    /// Deserializes into the tool's typed argument struct
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ToolError> {
        serde_json::from_value(Value::Object(self.args.clone()))
            .map_err(|e| ToolError::invalid(&self.tool, e.to_string()))
    }

    /// Get argument as string
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.args.get(key)?.as_str().map(str::to_string)
    }

    /// Raw argument object
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.args
    }
}

/// A validated call ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Correlation id from the completion API
    pub id: String,
    /// Tool name
    pub name: String,
    /// Validated arguments
    pub arguments: ToolArguments,
}

/// Result of exactly one tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Id of the call this answers
    pub call_id: String,
    /// Tool name
    pub name: String,
    /// Structured output
    #[serde(default)]
    pub result: Value,
    /// Error message, if the tool failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, name: impl Into<String>, result: Value) -> Self {
        Self { call_id: call_id.into(), name: name.into(), result, error: None }
    }

    pub fn failure(call_id: impl Into<String>, name: impl Into<String>, error: impl Into<String>) -> Self {
        Self { call_id: call_id.into(), name: name.into(), result: Value::Null, error: Some(error.into()) }
    }

    /// Text recorded in the conversation for this result
    pub fn to_message_text(&self) -> String {
        if let Some(error) = &self.error {
            return format!("Error: {error}");
        }
        serde_json::to_string_pretty(&self.result).unwrap_or_else(|_| self.result.to_string())
    }
}

/// Asks the human whether a sensitive operation may proceed
#[async_trait]
pub trait Confirmator: Send + Sync {
    /// Resolves to true if the user approved
    async fn request_confirmation(&self, operation: &str, detail: &str, dangerous: bool) -> bool;
}

/// Per-execution environment handed to tools
#[derive(Clone)]
pub struct ToolContext {
    cancellation: CancellationToken,
    confirmator: Option<Arc<dyn Confirmator>>,
    working_dir: PathBuf,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("confirmator", &self.confirmator.as_ref().map(|_| "<confirmator>"))
            .field("working_dir", &self.working_dir)
            .finish()
    }
}

impl ToolContext {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            cancellation: CancellationToken::new(),
            confirmator: None,
            working_dir: working_dir.into(),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    #[must_use]
    pub fn with_confirmator(mut self, confirmator: Option<Arc<dyn Confirmator>>) -> Self {
        self.confirmator = confirmator;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Resolves `path` against the working directory unless it is absolute
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.working_dir.join(candidate)
        }
    }

    /// Asks for approval. Without a confirmator the operation is allowed.
    pub async fn confirm(&self, operation: &str, detail: &str, dangerous: bool) -> bool {
        match &self.confirmator {
            Some(confirmator) => confirmator.request_confirmation(operation, detail, dangerous).await,
            None => true,
        }
    }
}

/// A capability the model can call
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name used in function calls
    fn name(&self) -> &str;

    /// Description shown to the model
    fn description(&self) -> &str;

    /// Parameter object schema
    fn parameter_schema(&self) -> ToolParameters;

    /// Names of parameters that must be present
    fn required_parameters(&self) -> Vec<String> {
        self.parameter_schema().required
    }

    /// Runs the tool
    async fn execute(&self, ctx: &ToolContext, args: ToolArguments) -> Result<Value, ToolError>;

    /// Schema advertised to the completion API
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameter_schema().to_value(),
        }
    }
}

/// Standard result for an operation the user declined
pub fn aborted(output: impl Into<String>) -> Value {
    serde_json::json!({ "output": output.into(), "aborted": true })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_parameters_builder() {
        let params = ToolParameters::new()
            .add_property("path", "string", "File path", true)
            .add_property("limit", "integer", "Max lines", false)
            .add_enum_property("mode", "Mode", &["a", "b"], false);

        assert_eq!(params.required, vec!["path".to_string()]);
        let value = params.to_value();
        assert_eq!(value["type"], "object");
        assert_eq!(value["properties"]["limit"]["type"], "integer");
        assert_eq!(value["properties"]["mode"]["enum"], serde_json::json!(["a", "b"]));
        assert!(value["properties"]["path"].get("enum").is_none());
    }

    #[test]
    fn test_arguments_from_json() {
        let required = vec!["path".to_string()];
        let args = ToolArguments::from_json("read_file", r#"{"path": "a.txt"}"#, &required).unwrap();
        assert_eq!(args.get_string("path").as_deref(), Some("a.txt"));

        let empty = ToolArguments::from_json("current_time", "  ", &[]).unwrap();
        assert!(empty.as_map().is_empty());
    }

    #[test]
    fn test_arguments_rejects_malformed() {
        let required = vec!["path".to_string()];
        assert!(matches!(
            ToolArguments::from_json("read_file", "{not json", &required),
            Err(ToolError::InvalidArguments { .. })
        ));
        assert!(ToolArguments::from_json("read_file", "[1,2]", &required).is_err());

        let err = ToolArguments::from_json("read_file", r#"{"path": null}"#, &required).unwrap_err();
        assert!(err.to_string().contains("missing required parameter 'path'"));
    }

    #[test]
    fn test_typed_parse() {
        #[derive(Deserialize)]
        struct Args {
            path: String,
            #[serde(default)]
            limit: Option<usize>,
        }

        let args = ToolArguments::from_json("t", r#"{"path": "x", "limit": 3}"#, &[]).unwrap();
        let parsed: Args = args.parse().unwrap();
        assert_eq!(parsed.path, "x");
        assert_eq!(parsed.limit, Some(3));

        let wrong = ToolArguments::from_json("t", r#"{"path": 5}"#, &[]).unwrap();
        assert!(wrong.parse::<Args>().is_err());
    }

    #[test]
    fn test_result_text() {
        let ok = ToolResult::success("c1", "t", serde_json::json!({"a": 1}));
        assert_eq!(ok.to_message_text(), "{\n  \"a\": 1\n}");

        let err = ToolResult::failure("c1", "t", "boom");
        assert_eq!(err.to_message_text(), "Error: boom");
    }

    #[test]
    fn test_context_resolves_relative_paths() {
        let ctx = ToolContext::new("/work");
        assert_eq!(ctx.resolve_path("src/main.rs"), PathBuf::from("/work/src/main.rs"));
        assert_eq!(ctx.resolve_path("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }

    #[tokio::test]
    async fn test_confirm_without_confirmator_allows() {
        assert!(ToolContext::new(".").confirm("op", "detail", true).await);
    }
}

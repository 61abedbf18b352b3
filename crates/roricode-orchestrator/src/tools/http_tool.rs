// http_request tool

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::tool::{Tool, ToolArguments, ToolContext, ToolError, ToolParameters, aborted};

const USER_AGENT: &str = concat!("RoriCode-HttpTool/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT_SECS: f64 = 30.0;

/// Upper bound accepted from the model.
const MAX_TIMEOUT_SECS: f64 = 300.0;
const ALLOWED_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

#[derive(Debug, Deserialize)]
struct HttpArgs {
    url: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    json: Option<Value>,
    #[serde(default)]
    timeout: Option<f64>,
}

/// Makes HTTP requests. Anything other than GET, HEAD and OPTIONS needs approval.
#[derive(Debug, Clone, Default)]
pub struct HttpRequestTool {
    client: Client,
}

impl HttpRequestTool {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Falls back to the default for missing, non-finite or non-positive values.
fn clamp_timeout(requested: Option<f64>) -> f64 {
    match requested {
        Some(t) if t.is_finite() && t > 0.0 => t.min(MAX_TIMEOUT_SECS),
        _ => DEFAULT_TIMEOUT_SECS,
    }
}

#[async_trait]
impl Tool for HttpRequestTool {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Make an HTTP request and return status, headers and body. \
         JSON responses are also returned parsed."
    }

    fn parameter_schema(&self) -> ToolParameters {
        ToolParameters::new()
            .add_property("url", "string", "Absolute URL to request", true)
            .add_enum_property("method", "HTTP method (default GET)", ALLOWED_METHODS, false)
            .add_property("headers", "object", "Request headers as a string map", false)
            .add_property("body", "string", "Raw request body", false)
            .add_property("json", "object", "JSON request body; sets Content-Type", false)
            .add_property("timeout", "number", "Timeout in seconds (default 30, maximum 300)", false)
    }

    async fn execute(&self, ctx: &ToolContext, args: ToolArguments) -> Result<Value, ToolError> {
        let args: HttpArgs = args.parse()?;
        let method_name = args.method.as_deref().unwrap_or("GET").trim().to_uppercase();
        if !ALLOWED_METHODS.contains(&method_name.as_str()) {
            return Err(ToolError::invalid(self.name(), format!("unsupported HTTP method: {method_name}")));
        }
        let method = Method::from_bytes(method_name.as_bytes())
            .map_err(|e| ToolError::invalid(self.name(), e.to_string()))?;

        let url = reqwest::Url::parse(&args.url)
            .map_err(|e| ToolError::invalid(self.name(), format!("invalid url '{}': {}", args.url, e)))?;

        let dangerous = !matches!(method_name.as_str(), "GET" | "HEAD" | "OPTIONS");
        if dangerous
            && !ctx
                .confirm("HTTP Request", &format!("Make {method_name} request to {url}"), true)
                .await
        {
            return Ok(aborted("User aborted HTTP request"));
        }

        let timeout = clamp_timeout(args.timeout);
        let mut request = self
            .client
            .request(method, url.clone())
            .timeout(Duration::from_secs_f64(timeout))
            .header(reqwest::header::USER_AGENT, USER_AGENT);
        for (key, value) in &args.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &args.json {
            request = request.json(body);
        } else if let Some(body) = args.body {
            request = request.body(body);
        }

        debug!(method = %method_name, url = %url, "Sending HTTP request");
        let response = tokio::select! {
            () = ctx.cancellation().cancelled() => return Err(ToolError::Cancelled),
            res = request.send() => res.map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout(Duration::from_secs_f64(timeout))
                } else {
                    ToolError::Execution(format!("request failed: {e}"))
                }
            })?,
        };

        let status = response.status();
        let mut headers = Map::new();
        for (name, value) in response.headers() {
            if !headers.contains_key(name.as_str()) {
                headers.insert(name.to_string(), json!(String::from_utf8_lossy(value.as_bytes())));
            }
        }
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));

        let body = response
            .text()
            .await
            .map_err(|e| ToolError::Execution(format!("failed to read response: {e}")))?;

        let mut result = json!({
            "url": url.to_string(),
            "method": method_name,
            "status_code": status.as_u16(),
            "status": status.to_string(),
            "headers": headers,
            "content_length": body.len(),
        });
        if is_json {
            if let Ok(parsed) = serde_json::from_str::<Value>(&body) {
                result["json"] = parsed;
            }
        }
        result["body"] = json!(body);
        Ok(result)
    }
}

//! Tool registry for orchestration
//!
//! A name to implementation map, built once and injected into the service.
//! Dispatch runs each call on its own task and answers through a single-use
//! channel.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use futures::FutureExt;
use roricode_abstraction::ToolSchema;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::tool::{Confirmator, Tool, ToolCall, ToolContext, ToolError, ToolResult};

/// Registered tools plus the confirmation hook handed to them.
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<String, Arc<dyn Tool>>>,
    confirmator: RwLock<Option<Arc<dyn Confirmator>>>,
    working_dir: PathBuf,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("working_dir", &self.working_dir)
            .finish_non_exhaustive()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

impl ToolRegistry {
    /// Creates an empty registry resolving relative paths against `working_dir`.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            tools: RwLock::new(BTreeMap::new()),
            confirmator: RwLock::new(None),
            working_dir: working_dir.into(),
        }
    }

    /// Adds a tool, replacing any tool with the same name.
    pub fn register(&self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        let replaced = self
            .tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), tool)
            .is_some();
        if replaced {
            warn!(tool = %name, "Replaced previously registered tool");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    /// All tools, ordered by name.
    pub fn list(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).values().cloned().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Schemas of every tool, for the completion API.
    pub fn describe_all(&self) -> Vec<ToolSchema> {
        self.list().iter().map(|tool| tool.schema()).collect()
    }

    /// Installs the confirmation hook passed to every tool execution.
    pub fn set_confirmator(&self, confirmator: Arc<dyn Confirmator>) {
        *self.confirmator.write().unwrap_or_else(PoisonError::into_inner) = Some(confirmator);
    }

    /// Required parameters of `name`, or `None` for an unknown tool.
    pub fn required_parameters(&self, name: &str) -> Option<Vec<String>> {
        self.get(name).map(|tool| tool.required_parameters())
    }

    fn context(&self, cancellation: CancellationToken) -> ToolContext {
        let confirmator = self.confirmator.read().unwrap_or_else(PoisonError::into_inner).clone();
        ToolContext::new(self.working_dir.clone())
            .with_cancellation(cancellation)
            .with_confirmator(confirmator)
    }

    /// Runs `call` on its own task and sends exactly one result on `result_tx`.
    ///
    /// Unknown tools and panicking tools both produce an error result.
    pub fn execute_async(
        &self,
        call: ToolCall,
        cancellation: CancellationToken,
        result_tx: oneshot::Sender<ToolResult>,
    ) {
        let tool = self.get(&call.name);
        let ctx = self.context(cancellation);

        tokio::spawn(async move {
            let ToolCall { id, name, arguments } = call;
            let outcome = match tool {
                None => Err(ToolError::NotFound(name.clone())),
                Some(tool) => {
                    debug!(call_id = %id, tool = %name, "Executing tool");
                    AssertUnwindSafe(tool.execute(&ctx, arguments))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| Err(ToolError::Execution("tool panicked".to_string())))
                }
            };

            let result = match outcome {
                Ok(value) => ToolResult::success(id, name, value),
                Err(err) => {
                    debug!(call_id = %id, tool = %name, error = %err, "Tool returned error");
                    ToolResult::failure(id, name, err.to_string())
                }
            };

            if result_tx.send(result).is_err() {
                debug!("Tool result receiver dropped");
            }
        });
    }

    /// Dispatches and waits for the result.
    pub async fn execute(&self, call: ToolCall, cancellation: CancellationToken) -> ToolResult {
        let (tx, rx) = oneshot::channel();
        let (id, name) = (call.id.clone(), call.name.clone());
        self.execute_async(call, cancellation, tx);
        rx.await.unwrap_or_else(|_| ToolResult::failure(id, name, "tool task ended without a result"))
    }
}

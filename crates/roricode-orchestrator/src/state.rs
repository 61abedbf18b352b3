//! Conversation state: the single source of truth for a chat session.
//!
//! Every field sits behind one mutex and is only reachable through named,
//! atomic transitions. Readers get copies, never references into the log.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use roricode_abstraction::{ChatMessage, Role, ToolCallRef};
use serde::{Deserialize, Serialize};

use crate::error::OrchestrationError;

/// Default number of completion rounds allowed per user message.
pub const DEFAULT_MAX_RECURSION_DEPTH: u32 = 5;

/// Kind of a UI display item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayKind {
    /// Banner and status lines produced by the program itself
    Program,
    User,
    Assistant,
    ToolCall,
    ToolResult,
}

/// One item of the UI projection of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMessage {
    pub kind: DisplayKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl DisplayMessage {
    fn plain(kind: DisplayKind, content: impl Into<String>) -> Self {
        Self { kind, content: content.into(), tool_call_id: None, tool_name: None }
    }

    fn tool(kind: DisplayKind, content: &str, call_id: &str, name: &str) -> Self {
        Self {
            kind,
            content: content.to_string(),
            tool_call_id: Some(call_id.to_string()),
            tool_name: Some(name.to_string()),
        }
    }
}

/// The projection plus flags, taken under a single lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiSnapshot {
    pub messages: Vec<DisplayMessage>,
    pub is_processing: bool,
    pub error: Option<OrchestrationError>,
}

#[derive(Debug)]
struct Inner {
    history: Vec<ChatMessage>,
    /// (history length when added, text)
    program_messages: Vec<(usize, String)>,
    is_processing: bool,
    last_error: Option<OrchestrationError>,
    pending_tool_calls: HashSet<String>,
    recursion_depth: u32,
    max_recursion_depth: u32,
}

/// Mutex-protected conversation log and round bookkeeping.
#[derive(Debug)]
pub struct ConversationState {
    inner: Mutex<Inner>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationState {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_recursion_depth(DEFAULT_MAX_RECURSION_DEPTH)
    }

    #[must_use]
    pub fn with_max_recursion_depth(max_recursion_depth: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                history: Vec::new(),
                program_messages: Vec::new(),
                is_processing: false,
                last_error: None,
                pending_tool_calls: HashSet::new(),
                recursion_depth: 0,
                max_recursion_depth,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a banner/status line at the current end of the log.
    pub fn add_program_message(&self, content: impl Into<String>) {
        let mut inner = self.lock();
        let at = inner.history.len();
        inner.program_messages.push((at, content.into()));
    }

    /// Marks a round as started and records the user's message.
    ///
    /// Always accepted, even while another round is in flight.
    pub fn start_processing_with_user_message(&self, content: impl Into<String>) {
        let mut inner = self.lock();
        inner.is_processing = true;
        inner.last_error = None;
        inner.history.push(ChatMessage::user(content));
    }

    /// Appends one assistant entry carrying both the text and its tool calls.
    pub fn add_assistant_message_with_tool_calls(
        &self,
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRef>,
    ) {
        self.lock().history.push(ChatMessage::assistant(content, tool_calls));
    }

    /// Appends a tool-result entry. Does not touch the pending set.
    pub fn add_tool_result_message(
        &self,
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        result_text: impl Into<String>,
    ) {
        self.lock().history.push(ChatMessage::tool(call_id, tool_name, result_text));
    }

    /// Registers a call id as outstanding.
    pub fn add_pending_tool_call(&self, call_id: impl Into<String>) {
        self.lock().pending_tool_calls.insert(call_id.into());
    }

    /// Registers a whole round of call ids under one lock.
    pub fn add_pending_tool_calls<'a>(&self, call_ids: impl IntoIterator<Item = &'a str>) {
        let mut inner = self.lock();
        inner.pending_tool_calls.extend(call_ids.into_iter().map(str::to_string));
    }

    /// Removes `call_id` and returns true iff nothing is outstanding anymore.
    ///
    /// The emptiness check happens under the same lock as the removal, so at
    /// most one caller per round observes `true`.
    pub fn complete_pending_tool_call(&self, call_id: &str) -> bool {
        let mut inner = self.lock();
        let removed = inner.pending_tool_calls.remove(call_id);
        removed && inner.pending_tool_calls.is_empty()
    }

    pub fn has_pending_tool_calls(&self) -> bool {
        !self.lock().pending_tool_calls.is_empty()
    }

    /// True while another completion round is allowed.
    pub fn can_recurse(&self) -> bool {
        let inner = self.lock();
        inner.recursion_depth < inner.max_recursion_depth
    }

    /// Counts one completion call. Never exceeds the maximum.
    pub fn increment_recursion(&self) {
        let mut inner = self.lock();
        if inner.recursion_depth < inner.max_recursion_depth {
            inner.recursion_depth += 1;
        }
    }

    pub fn reset_recursion(&self) {
        self.lock().recursion_depth = 0;
    }

    pub fn recursion_depth(&self) -> u32 {
        self.lock().recursion_depth
    }

    pub fn max_recursion_depth(&self) -> u32 {
        self.lock().max_recursion_depth
    }

    /// Ends the round successfully.
    pub fn finish_processing(&self) {
        let mut inner = self.lock();
        inner.is_processing = false;
        inner.last_error = None;
    }

    /// Ends the round with an error.
    pub fn finish_processing_with_error(&self, err: OrchestrationError) {
        let mut inner = self.lock();
        inner.is_processing = false;
        inner.last_error = Some(err);
    }

    pub fn is_processing(&self) -> bool {
        self.lock().is_processing
    }

    pub fn last_error(&self) -> Option<OrchestrationError> {
        self.lock().last_error.clone()
    }

    /// Copy of the raw conversation log.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.lock().history.clone()
    }

    /// Conversation log with `preamble` prepended as a system message.
    pub fn history_with_system_prompt(&self, preamble: impl Into<String>) -> Vec<ChatMessage> {
        let inner = self.lock();
        let mut messages = Vec::with_capacity(inner.history.len() + 1);
        messages.push(ChatMessage::system(preamble));
        messages.extend(inner.history.iter().cloned());
        messages
    }

    /// Renders the whole log into UI display items.
    pub fn get_messages(&self) -> Vec<DisplayMessage> {
        project(&self.lock())
    }

    /// Projection plus flags, consistent with each other.
    pub fn ui_snapshot(&self) -> UiSnapshot {
        let inner = self.lock();
        UiSnapshot {
            messages: project(&inner),
            is_processing: inner.is_processing,
            error: inner.last_error.clone(),
        }
    }
}

fn project(inner: &Inner) -> Vec<DisplayMessage> {
    let mut call_names: HashMap<&str, &str> = HashMap::new();
    for message in &inner.history {
        for call in &message.tool_calls {
            call_names.insert(call.id.as_str(), call.name.as_str());
        }
    }

    let mut out = Vec::with_capacity(inner.history.len() + inner.program_messages.len());
    let mut program = inner.program_messages.iter().peekable();
    for (index, message) in inner.history.iter().enumerate() {
        while let Some((_, text)) = program.next_if(|(at, _)| *at <= index) {
            out.push(DisplayMessage::plain(DisplayKind::Program, text.clone()));
        }
        match message.role {
            Role::User => out.push(DisplayMessage::plain(DisplayKind::User, message.content.clone())),
            Role::Assistant => {
                if !message.content.is_empty() {
                    out.push(DisplayMessage::plain(DisplayKind::Assistant, message.content.clone()));
                }
                for call in &message.tool_calls {
                    out.push(DisplayMessage::tool(
                        DisplayKind::ToolCall,
                        &call.arguments_json,
                        &call.id,
                        &call.name,
                    ));
                }
            }
            Role::Tool => {
                let call_id = message.tool_call_id.as_deref().unwrap_or_default();
                let name = call_names.get(call_id).copied().unwrap_or("unknown");
                out.push(DisplayMessage::tool(DisplayKind::ToolResult, &message.content, call_id, name));
            }
            Role::System => {}
        }
    }
    out.extend(program.map(|(_, text)| DisplayMessage::plain(DisplayKind::Program, text.clone())));
    out
}

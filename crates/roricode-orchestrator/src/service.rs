// Chat service: the orchestration control loop
//
// Consumes UI events, drives completion rounds, fans tool calls out to the
// registry and fans their results back in, then pushes incremental state
// updates to the UI. Rounds are driven by an iterative loop; the tool-result
// handler that empties the pending set releases the round's barrier.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use roricode_abstraction::{CompletionClient, ToolCallRef};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::{CoreEvent, EventBus, UiEvent};
use crate::confirmation::ConfirmationBroker;
use crate::error::{OrchestrationError, Result};
use crate::prompt::system_preamble;
use crate::state::{ConversationState, DEFAULT_MAX_RECURSION_DEPTH};
use crate::tools::{Confirmator, ToolArguments, ToolCall, ToolRegistry, ToolResult};

/// Orchestrator policy.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Completion rounds allowed per user message
    pub max_recursion_depth: u32,
    /// Name of the active profile, shown in the welcome banner
    pub profile_name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH, profile_name: "default".to_string() }
    }
}

/// Welcome lines shown before the conversation.
fn welcome_messages(profile_name: &str, configured: bool) -> Vec<String> {
    let mut lines = vec!["-- RORICODE --".to_string(), String::new()];
    if configured {
        lines.push(format!("Active Profile: {profile_name} [OK]"));
        lines.push("Ready to chat! Type your message and press Enter".to_string());
    } else {
        lines.push(format!("Active Profile: {profile_name} [NOT CONFIGURED]"));
        lines.push("To start chatting, configure an API key:".to_string());
        lines.push("  • Run: roricode profile add <name> --api-key <key>".to_string());
        lines.push("  • Or edit: ~/.roricode/config.toml".to_string());
    }
    lines.push("Controls: type /exit or 'q' to quit".to_string());
    lines.push(String::new());
    lines
}

/// Single-use release signal for one round's fan-in barrier.
type Barrier = Arc<Mutex<Option<oneshot::Sender<()>>>>;

enum RoundOutcome {
    /// The model answered without tool calls
    Finished,
    /// The round ended with an error already recorded in state
    Failed,
    /// Tools are running; the receiver fires once every result is recorded
    AwaitingTools(oneshot::Receiver<()>),
}

/// User messages waiting for the conversation to become idle.
#[derive(Default)]
struct Inbox {
    /// A driver task owns the conversation
    driving: bool,
    waiting: VecDeque<(String, oneshot::Sender<()>)>,
}

struct ServiceInner {
    client: Option<Arc<dyn CompletionClient>>,
    registry: Arc<ToolRegistry>,
    bus: Arc<EventBus>,
    broker: Arc<ConfirmationBroker>,
    state: ConversationState,
    cancel: CancellationToken,
    last_sent_count: Mutex<usize>,
    inbox: Mutex<Inbox>,
}

/// The orchestrator. Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct ChatService {
    inner: Arc<ServiceInner>,
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("configured", &self.inner.client.is_some())
            .field("registry", &self.inner.registry)
            .field("state", &self.inner.state)
            .finish_non_exhaustive()
    }
}

impl ChatService {
    /// Creates the service. `client` is `None` when no usable profile exists;
    /// the service still starts and reports a configuration error per message.
    pub fn new(
        client: Option<Arc<dyn CompletionClient>>,
        registry: Arc<ToolRegistry>,
        bus: Arc<EventBus>,
        config: ServiceConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let broker = Arc::new(ConfirmationBroker::new(Arc::clone(&bus), cancel.clone()));
        registry.set_confirmator(Arc::clone(&broker) as Arc<dyn Confirmator>);

        let state = ConversationState::with_max_recursion_depth(config.max_recursion_depth);
        for line in welcome_messages(&config.profile_name, client.is_some()) {
            state.add_program_message(line);
        }

        Self {
            inner: Arc::new(ServiceInner {
                client,
                registry,
                bus,
                broker,
                state,
                cancel,
                last_sent_count: Mutex::new(0),
                inbox: Mutex::new(Inbox::default()),
            }),
        }
    }

    /// Pushes the initial state and spawns the event loop.
    ///
    /// # Errors
    /// Returns `AlreadyStarted` if the bus's `UI -> core` receiver was already taken.
    pub fn start(&self) -> Result<JoinHandle<()>> {
        let rx = self.inner.bus.ui_to_core_channel().ok_or(OrchestrationError::AlreadyStarted)?;
        self.inner.push_state_to_ui();
        let service = self.clone();
        Ok(tokio::spawn(async move { service.event_loop(rx).await }))
    }

    /// Cancels the event loop, in-flight completion calls and confirmation waits.
    pub fn stop(&self) {
        info!("Stopping chat service");
        self.inner.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    async fn event_loop(&self, mut rx: mpsc::Receiver<UiEvent>) {
        info!(tools = self.inner.registry.len(), "Chat service started");
        loop {
            tokio::select! {
                () = self.inner.cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
            }
        }
        info!("Chat service event loop ended");
    }

    fn handle_event(&self, event: UiEvent) {
        match event {
            UiEvent::SendMessage { text } => {
                if text.trim().is_empty() {
                    debug!("Ignoring empty message");
                    return;
                }
                drop(self.process_message(text));
            }
            UiEvent::ConfirmationResponse { id, approved } => {
                self.inner.broker.handle_response(&id, approved);
            }
        }
    }

    /// Records a user message and drives the conversation until the model stops
    /// calling tools or the round fails.
    ///
    /// Only one conversation runs at a time: a message arriving while another is
    /// in flight waits and is recorded once the conversation is idle again. The
    /// returned handle completes when this message has been handled.
    pub fn process_message(&self, text: impl Into<String>) -> JoinHandle<()> {
        let (done_tx, done_rx) = oneshot::channel();
        let start_driver = {
            let mut inbox = self.inner.inbox.lock().unwrap_or_else(PoisonError::into_inner);
            inbox.waiting.push_back((text.into(), done_tx));
            if inbox.driving {
                debug!(waiting = inbox.waiting.len(), "Conversation busy, message queued");
            }
            !std::mem::replace(&mut inbox.driving, true)
        };
        if start_driver {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.run_inbox().await });
        }
        tokio::spawn(async move {
            // A dropped sender means the service stopped first.
            let _ = done_rx.await;
        })
    }

    /// Sends messages appended since the last successful push, plus the flags.
    pub fn push_state_to_ui(&self) {
        self.inner.push_state_to_ui();
    }

    /// Conversation state, for inspection.
    pub fn state(&self) -> &ConversationState {
        &self.inner.state
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.inner.registry
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.inner.bus
    }

    pub fn is_configured(&self) -> bool {
        self.inner.client.is_some()
    }
}

impl ServiceInner {
    /// Handles queued user messages one at a time until the inbox is empty.
    async fn run_inbox(self: Arc<Self>) {
        loop {
            let next = {
                let mut inbox = self.inbox.lock().unwrap_or_else(PoisonError::into_inner);
                if self.cancel.is_cancelled() {
                    inbox.waiting.clear();
                }
                match inbox.waiting.pop_front() {
                    Some(next) => next,
                    None => {
                        inbox.driving = false;
                        return;
                    }
                }
            };
            let (text, done) = next;
            self.state.start_processing_with_user_message(text);
            self.state.reset_recursion();
            self.push_state_to_ui();
            self.drive().await;
            let _ = done.send(());
        }
    }

    async fn drive(self: &Arc<Self>) {
        loop {
            match self.continue_conversation().await {
                RoundOutcome::Finished | RoundOutcome::Failed => break,
                RoundOutcome::AwaitingTools(barrier) => {
                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            self.fail(OrchestrationError::Cancelled);
                            break;
                        }
                        released = barrier => {
                            if released.is_err() {
                                // Every handler finished without emptying the set.
                                warn!("Tool barrier dropped before release");
                                self.fail(OrchestrationError::Cancelled);
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    /// One completion round.
    async fn continue_conversation(self: &Arc<Self>) -> RoundOutcome {
        let Some(client) = self.client.clone() else {
            return self.fail(OrchestrationError::NotConfigured);
        };

        if !self.state.can_recurse() {
            let max = self.state.max_recursion_depth();
            warn!(max_depth = max, "Tool call recursion limit reached");
            return self.fail(OrchestrationError::RecursionLimit(max));
        }
        self.state.increment_recursion();

        let messages = self.state.history_with_system_prompt(system_preamble());
        let tools = self.registry.describe_all();
        debug!(
            depth = self.state.recursion_depth(),
            messages = messages.len(),
            tools = tools.len(),
            model = %client.model_id(),
            "Calling completion API"
        );

        let response = tokio::select! {
            () = self.cancel.cancelled() => return self.fail(OrchestrationError::Cancelled),
            response = client.create_completion(&messages, &tools) => response,
        };
        let response = match response {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, "Completion API call failed");
                return self.fail(err.into());
            }
        };

        if !response.has_tool_calls() {
            if !response.content.is_empty() {
                self.state.add_assistant_message_with_tool_calls(response.content, Vec::new());
            }
            self.state.finish_processing();
            self.state.reset_recursion();
            self.push_state_to_ui();
            return RoundOutcome::Finished;
        }

        let calls = unique_calls(&response.tool_calls);
        self.state.add_assistant_message_with_tool_calls(response.content, calls.clone());
        self.push_state_to_ui();

        let (release, barrier) = oneshot::channel();
        let release: Barrier = Arc::new(Mutex::new(Some(release)));
        // Register the whole round before the first result can complete it.
        self.state.add_pending_tool_calls(calls.iter().map(|call| call.id.as_str()));
        debug!(count = calls.len(), "Dispatching tool calls");
        for call in calls {
            self.dispatch(call, &release);
        }
        RoundOutcome::AwaitingTools(barrier)
    }

    fn dispatch(self: &Arc<Self>, call: ToolCallRef, release: &Barrier) {
        let required = self.registry.required_parameters(&call.name).unwrap_or_default();
        let arguments = match ToolArguments::from_json(&call.name, &call.arguments_json, &required) {
            Ok(arguments) => arguments,
            Err(err) => {
                warn!(call_id = %call.id, tool = %call.name, error = %err, "Rejected tool arguments");
                self.record_result(&call.id, &call.name, format!("Error parsing arguments: {err}"), release);
                return;
            }
        };

        let (tx, rx) = oneshot::channel();
        let ToolCallRef { id, name, .. } = call;
        self.registry.execute_async(
            ToolCall { id: id.clone(), name: name.clone(), arguments },
            self.cancel.child_token(),
            tx,
        );

        let inner = Arc::clone(self);
        let release = Arc::clone(release);
        tokio::spawn(async move {
            let result = rx
                .await
                .unwrap_or_else(|_| ToolResult::failure(&id, &name, "tool task ended without a result"));
            inner.record_result(&id, &name, result.to_message_text(), &release);
        });
    }

    fn record_result(&self, call_id: &str, name: &str, text: String, release: &Barrier) {
        self.state.add_tool_result_message(call_id, name, text);
        self.push_state_to_ui();
        if self.state.complete_pending_tool_call(call_id) {
            debug!(call_id = %call_id, "Last tool result of the round recorded");
            if let Some(tx) = release.lock().unwrap_or_else(PoisonError::into_inner).take() {
                // The driver may have been cancelled; nothing to release then.
                let _ = tx.send(());
            }
        }
    }

    fn fail(&self, err: OrchestrationError) -> RoundOutcome {
        self.state.finish_processing_with_error(err);
        self.state.reset_recursion();
        self.push_state_to_ui();
        RoundOutcome::Failed
    }

    fn push_state_to_ui(&self) {
        let mut last_sent = self.last_sent_count.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.state.ui_snapshot();
        let mut messages = snapshot.messages;
        let total = messages.len();
        let new_messages = messages.split_off((*last_sent).min(total));

        let event = CoreEvent::StateUpdate {
            new_messages,
            is_processing: snapshot.is_processing,
            error: snapshot.error.map(|e| e.to_string()),
        };
        match self.bus.send_to_ui(event) {
            Ok(()) => *last_sent = total,
            // Unsent messages go out with the next successful push.
            Err(err) => warn!(error = %err, "Dropped UI state update"),
        }
    }
}

/// First occurrence of every call id, in order.
fn unique_calls(calls: &[ToolCallRef]) -> Vec<ToolCallRef> {
    let mut seen = HashSet::new();
    calls
        .iter()
        .filter(|call| {
            let fresh = seen.insert(call.id.as_str());
            if !fresh {
                warn!(call_id = %call.id, "Duplicate tool call id skipped");
            }
            fresh
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DisplayKind;
    use async_trait::async_trait;
    use roricode_abstraction::{ChatMessage, CompletionResponse, ModelError, ToolSchema};

    struct FixedClient(CompletionResponse);

    #[async_trait]
    impl CompletionClient for FixedClient {
        async fn create_completion(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolSchema],
        ) -> std::result::Result<CompletionResponse, ModelError> {
            Ok(self.0.clone())
        }

        fn model_id(&self) -> &str {
            "fixed"
        }
    }

    fn service(client: Option<Arc<dyn CompletionClient>>) -> (ChatService, mpsc::Receiver<CoreEvent>) {
        let bus = Arc::new(EventBus::new());
        let rx = bus.core_to_ui_channel().unwrap();
        let config = ServiceConfig { profile_name: "work".to_string(), ..ServiceConfig::default() };
        (ChatService::new(client, Arc::new(ToolRegistry::new(".")), bus, config), rx)
    }

    fn program_lines(service: &ChatService) -> Vec<String> {
        service
            .state()
            .get_messages()
            .into_iter()
            .filter(|m| m.kind == DisplayKind::Program)
            .map(|m| m.content)
            .collect()
    }

    #[test]
    fn test_welcome_reflects_configuration() {
        let (configured, _rx) = service(Some(Arc::new(FixedClient(CompletionResponse::text("hi")))));
        let lines = program_lines(&configured);
        assert_eq!(lines[0], "-- RORICODE --");
        assert!(lines.contains(&"Active Profile: work [OK]".to_string()));

        let (unconfigured, _rx) = service(None);
        let lines = program_lines(&unconfigured);
        assert!(lines.contains(&"Active Profile: work [NOT CONFIGURED]".to_string()));
        assert!(lines.iter().any(|l| l.contains("roricode profile add")));
    }

    #[tokio::test]
    async fn test_start_pushes_welcome_and_rejects_second_start() {
        let (service, mut rx) = service(None);
        let handle = service.start().unwrap();

        match rx.recv().await {
            Some(CoreEvent::StateUpdate { new_messages, is_processing, error }) => {
                assert_eq!(new_messages.len(), program_lines(&service).len());
                assert!(!is_processing);
                assert!(error.is_none());
            }
            other => panic!("unexpected event {other:?}"),
        }

        assert!(matches!(service.start(), Err(OrchestrationError::AlreadyStarted)));
        service.stop();
        handle.await.unwrap();
        assert!(service.is_stopped());
    }

    #[tokio::test]
    async fn test_plain_answer_finishes_round() {
        let (service, _rx) = service(Some(Arc::new(FixedClient(CompletionResponse::text("Hello!")))));
        service.process_message("hi").await.unwrap();

        let history = service.state().history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "Hello!");
        assert!(!service.state().is_processing());
        assert_eq!(service.state().recursion_depth(), 0);
    }

    #[tokio::test]
    async fn test_empty_answer_appends_nothing() {
        let (service, _rx) = service(Some(Arc::new(FixedClient(CompletionResponse::default()))));
        service.process_message("hi").await.unwrap();

        assert_eq!(service.state().history().len(), 1);
        assert!(!service.state().is_processing());
        assert!(service.state().last_error().is_none());
    }

    #[test]
    fn test_unique_calls_keeps_first() {
        let calls = vec![
            ToolCallRef::new("a", "shell", "{}"),
            ToolCallRef::new("b", "shell", "{}"),
            ToolCallRef::new("a", "list_dir", "{}"),
        ];
        let unique = unique_calls(&calls);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].name, "shell");
        assert_eq!(unique[1].id, "b");
    }
}

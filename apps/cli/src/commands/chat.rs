//! Interactive chat mode.
//!
//! Wires the configuration, the completion client and the builtin tools into a
//! [`ChatService`], then runs a line-based front-end over the event bus: state
//! updates are rendered as they arrive, confirmation requests become y/N
//! questions, and every other input line is sent as a user message.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use roricode_core::Config;
use roricode_models::client_from_config;
use roricode_orchestrator::{
    ChatService, ConfirmationRequest, CoreEvent, DisplayKind, EventBus, ServiceConfig,
    ToolRegistry, UiEvent, register_builtin_tools,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::event_renderer;

/// Buffered input lines not yet consumed by the front-end.
const INPUT_BUFFER: usize = 16;

/// What the front-end knows about the conversation.
#[derive(Debug, Default)]
struct Session {
    /// A message was sent and the service has not acknowledged it yet.
    awaiting_ack: bool,
    /// The service reported a round in progress.
    processing: bool,
    /// Confirmation waiting for the user's answer.
    pending_confirmation: Option<ConfirmationRequest>,
    /// Lines typed while a round was running.
    queued: VecDeque<String>,
    /// Stdin reached end of file.
    input_closed: bool,
}

impl Session {
    fn is_idle(&self) -> bool {
        !self.awaiting_ack && !self.processing
    }
}

/// What to do with one line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Quit,
    Skip,
    Message(String),
}

fn classify(line: &str) -> Input {
    match line.trim() {
        "" => Input::Skip,
        "/exit" | "/quit" | "q" => Input::Quit,
        text => Input::Message(text.to_string()),
    }
}

fn is_approval(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Execute the chat command, optionally switching to `profile_override` first.
pub async fn execute(profile_override: Option<String>) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(name) = profile_override {
        config.switch_profile(&name)?;
        config.save().context("Failed to save configuration")?;
    }

    let client = client_from_config(&config);
    let working_dir = std::env::current_dir().context("Failed to determine working directory")?;
    let registry = Arc::new(ToolRegistry::new(working_dir));
    register_builtin_tools(&registry);

    let bus = Arc::new(EventBus::new());
    bus.set_error_callback(|e| warn!(error = %e, "Event bus send failed"));
    let mut events = bus.core_to_ui_channel().context("UI channel already taken")?;

    let service = ChatService::new(
        client,
        registry,
        Arc::clone(&bus),
        ServiceConfig { profile_name: config.active_profile.clone(), ..ServiceConfig::default() },
    );
    let handle = service.start()?;

    let mut input = spawn_stdin_reader();
    let mut session = Session::default();

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                if !handle_core_event(&bus, &mut session, event) {
                    break;
                }
            }
            line = input.recv(), if !session.input_closed => {
                let keep_going = match line {
                    Some(line) => handle_line(&bus, &mut session, &line),
                    None => {
                        debug!("Input closed");
                        session.input_closed = true;
                        if let Some(request) = session.pending_confirmation.take() {
                            answer(&bus, &request, false);
                        }
                        !session.is_idle() || !session.queued.is_empty()
                    }
                };
                if !keep_going {
                    break;
                }
            }
        }
    }

    service.stop();
    if let Err(e) = handle.await {
        warn!(error = %e, "Chat service task failed");
    }
    println!("\nGoodbye!");
    Ok(())
}

/// Reads stdin on a plain thread so a pending read never holds up shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(INPUT_BUFFER);
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Returns false when the front-end should exit.
fn handle_core_event(bus: &EventBus, session: &mut Session, event: CoreEvent) -> bool {
    match event {
        CoreEvent::StateUpdate { new_messages, is_processing, error } => {
            event_renderer::render_update(&new_messages, error.as_deref());
            if is_processing && !session.processing {
                println!("{}", "  thinking...".dimmed());
            }
            if is_processing || new_messages.iter().any(|m| m.kind == DisplayKind::User) {
                session.awaiting_ack = false;
            }
            session.processing = is_processing;
            if session.is_idle() {
                return on_idle(bus, session);
            }
        }
        CoreEvent::ConfirmationRequest(request) => {
            if session.input_closed {
                println!("{}", event_renderer::format_confirmation(&request));
                println!("{}", "(no input, denied)".dimmed());
                answer(bus, &request, false);
            } else {
                print!("{}", event_renderer::format_confirmation(&request));
                flush();
                session.pending_confirmation = Some(request);
            }
        }
    }
    true
}

/// Returns false when the front-end should exit.
fn handle_line(bus: &EventBus, session: &mut Session, line: &str) -> bool {
    if let Some(request) = session.pending_confirmation.take() {
        answer(bus, &request, is_approval(line));
        return true;
    }

    match classify(line) {
        Input::Quit => false,
        Input::Skip => {
            if session.is_idle() {
                prompt();
            }
            true
        }
        Input::Message(text) => {
            if session.is_idle() {
                send(bus, session, text);
            } else {
                session.queued.push_back(text);
            }
            true
        }
    }
}

/// Sends the next queued line, or exits once input is exhausted.
fn on_idle(bus: &EventBus, session: &mut Session) -> bool {
    if let Some(text) = session.queued.pop_front() {
        send(bus, session, text);
        return true;
    }
    if session.input_closed {
        return false;
    }
    prompt();
    true
}

fn send(bus: &EventBus, session: &mut Session, text: String) {
    match bus.send_to_core(UiEvent::SendMessage { text }) {
        Ok(()) => session.awaiting_ack = true,
        Err(e) => {
            println!("{}", event_renderer::format_error(&e.to_string()));
            prompt();
        }
    }
}

fn answer(bus: &EventBus, request: &ConfirmationRequest, approved: bool) {
    let event = UiEvent::ConfirmationResponse { id: request.id.clone(), approved };
    if let Err(e) = bus.send_to_core(event) {
        warn!(id = %request.id, error = %e, "Failed to deliver confirmation answer");
    }
}

fn prompt() {
    print!("\n{} ", ">".green().bold());
    flush();
}

fn flush() {
    if let Err(e) = io::stdout().flush() {
        debug!(error = %e, "Failed to flush stdout");
    }
}

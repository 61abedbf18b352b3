//! Terminal rendering for state updates pushed by the chat service.
//!
//! Formatting is kept separate from printing so the output can be checked
//! without a terminal.

use colored::Colorize;
use roricode_orchestrator::{ConfirmationRequest, DisplayKind, DisplayMessage};

/// Tool output longer than this is cut in the transcript.
const MAX_RESULT_PREVIEW_CHARS: usize = 400;

/// Formats one display message. User messages are already on screen and
/// render as `None`.
pub fn format_message(message: &DisplayMessage) -> Option<String> {
    match message.kind {
        DisplayKind::User => None,
        DisplayKind::Program => Some(format_program_line(&message.content)),
        DisplayKind::Assistant => Some(format!("\n{}", message.content.trim_end())),
        DisplayKind::ToolCall => {
            let name = message.tool_name.as_deref().unwrap_or("tool");
            Some(format!("  {} {}({})", "⚙".cyan(), name.cyan().bold(), message.content.dimmed()))
        }
        DisplayKind::ToolResult => {
            let preview = indent(&truncate(&message.content, MAX_RESULT_PREVIEW_CHARS), "    ");
            if message.content.starts_with("Error") {
                Some(format!("  {}\n{}", "✗".red(), preview.red()))
            } else {
                Some(format!("  {}\n{}", "✓".green(), preview.dimmed()))
            }
        }
    }
}

fn format_program_line(line: &str) -> String {
    if line.starts_with("--") {
        line.bold().cyan().to_string()
    } else if line.contains("[NOT CONFIGURED]") {
        line.yellow().to_string()
    } else if line.contains("[OK]") {
        line.green().to_string()
    } else {
        line.to_string()
    }
}

/// Formats the error that ended a round.
pub fn format_error(error: &str) -> String {
    format!("\n  {} Error: {}", "✗".red().bold(), error.red())
}

/// Formats a confirmation request as a y/N question.
pub fn format_confirmation(request: &ConfirmationRequest) -> String {
    let marker = if request.dangerous { "⚠".red().bold() } else { "?".yellow().bold() };
    format!(
        "\n  {} {}: {}\n  {} ",
        marker,
        request.operation.bold(),
        request.command,
        "Allow? [y/N]".yellow()
    )
}

/// Prints the messages of one state update, followed by its error if any.
pub fn render_update(new_messages: &[DisplayMessage], error: Option<&str>) {
    for line in new_messages.iter().filter_map(format_message) {
        println!("{}", line);
    }
    if let Some(error) = error {
        println!("{}", format_error(error));
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim_end();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines().map(|line| format!("{}{}", prefix, line)).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(kind: DisplayKind, content: &str) -> DisplayMessage {
        DisplayMessage { kind, content: content.to_string(), tool_call_id: None, tool_name: None }
    }

    fn tool_message(kind: DisplayKind, content: &str, name: &str) -> DisplayMessage {
        DisplayMessage {
            kind,
            content: content.to_string(),
            tool_call_id: Some("call_1".to_string()),
            tool_name: Some(name.to_string()),
        }
    }

    #[test]
    fn test_user_messages_are_not_echoed() {
        colored::control::set_override(false);
        assert_eq!(format_message(&message(DisplayKind::User, "hello")), None);
    }

    #[test]
    fn test_tool_call_and_result_lines() {
        colored::control::set_override(false);

        let call = tool_message(DisplayKind::ToolCall, r#"{"path":"."}"#, "list_dir");
        assert_eq!(format_message(&call).unwrap(), r#"  ⚙ list_dir({"path":"."})"#);

        let ok = tool_message(DisplayKind::ToolResult, "line one\nline two", "list_dir");
        assert_eq!(format_message(&ok).unwrap(), "  ✓\n    line one\n    line two");

        let failed = tool_message(DisplayKind::ToolResult, "Error: boom", "shell");
        assert_eq!(format_message(&failed).unwrap(), "  ✗\n    Error: boom");
    }

    #[test]
    fn test_long_results_are_truncated_on_char_boundaries() {
        let long = "é".repeat(MAX_RESULT_PREVIEW_CHARS + 10);
        let cut = truncate(&long, MAX_RESULT_PREVIEW_CHARS);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), MAX_RESULT_PREVIEW_CHARS + 3);
        assert_eq!(truncate("short", MAX_RESULT_PREVIEW_CHARS), "short");
    }

    #[test]
    fn test_confirmation_prompt_mentions_command() {
        colored::control::set_override(false);
        let request = ConfirmationRequest {
            id: "1".into(),
            operation: "Execute command".into(),
            command: "rm -rf build".into(),
            dangerous: true,
        };
        let prompt = format_confirmation(&request);
        assert!(prompt.contains("Execute command: rm -rf build"));
        assert!(prompt.contains("Allow? [y/N]"));
    }
}

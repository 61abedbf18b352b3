// Bus event vocabulary shared with the presentation layer

use serde::{Deserialize, Serialize};

use crate::state::DisplayMessage;

/// Events sent from the UI to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    /// The user submitted a message.
    SendMessage {
        /// Message text
        text: String,
    },
    /// The user answered a confirmation prompt.
    ConfirmationResponse {
        /// Correlation id from the matching request
        id: String,
        /// Whether the operation may proceed
        approved: bool,
    },
}

/// A request for the user to approve a sensitive operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    /// Opaque correlation id
    pub id: String,
    /// Short operation label (e.g. "Execute command")
    pub operation: String,
    /// What exactly will be done
    pub command: String,
    /// Whether the operation can cause damage
    pub dangerous: bool,
}

/// Events sent from the orchestrator to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreEvent {
    /// Messages appended since the previous update, plus current flags.
    StateUpdate {
        /// Only the messages the UI has not seen yet
        new_messages: Vec<DisplayMessage>,
        /// True while a round is in progress
        is_processing: bool,
        /// Error that ended the last round, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A tool is waiting for the user's approval.
    ConfirmationRequest(ConfirmationRequest),
}

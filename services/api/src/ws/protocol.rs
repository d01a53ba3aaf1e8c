//! Defines the WebSocket message protocol between the browser client and the API server.

use jedi_core::Snapshot;
use serde::{Deserialize, Serialize};

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Replaces the current learning path with one for `topic`.
    LoadPath { topic: String },
    ToggleCompletion { subtopic: String },
    /// Opens (or reopens) the quiz for a subtopic.
    OpenQuiz { subtopic: String },
    CloseQuiz,
    SelectAnswer { question_index: usize, option: String },
    /// Asks a question about the loaded topic.
    Ask { question: String },
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The complete session state after a change.
    StateUpdate { state: Snapshot },
    /// A rejected operation or a failed load.
    Error { message: String },
}

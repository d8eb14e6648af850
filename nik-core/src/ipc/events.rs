//! Event types carried by the gui-update queue and the status broadcast.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// gui-update queue
// ---------------------------------------------------------------------------

/// One mutation of the visual surface, applied by the UI thread in FIFO order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UiUpdate {
    /// Replace the status line.
    Status { text: String, tone: StatusTone },
    /// Append a transcript entry.
    Message { speaker: Speaker, text: String },
    /// Voice-input toggle indicator changed.
    VoiceInput { active: bool },
}

impl UiUpdate {
    pub fn status(text: impl Into<String>, tone: StatusTone) -> Self {
        Self::Status {
            text: text.into(),
            tone,
        }
    }

    pub fn message(speaker: Speaker, text: impl Into<String>) -> Self {
        Self::Message {
            speaker,
            text: text.into(),
        }
    }
}

/// Who a transcript line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    /// Label printed in front of a transcript line.
    pub fn label(self) -> &'static str {
        match self {
            Speaker::User => "You",
            Speaker::Assistant => "Nik",
        }
    }
}

/// Colour class of the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTone {
    /// Listening / healthy.
    Active,
    /// Processing a capture.
    Busy,
    /// Recognition or device failure, voice input inactive.
    Alert,
}

// ---------------------------------------------------------------------------
// Session status broadcast
// ---------------------------------------------------------------------------

/// Emitted by `AssistantEngine` whenever the session changes state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusEvent {
    pub status: SessionStatus,
    /// Optional human-readable detail (e.g. why the session ended).
    pub detail: Option<String>,
}

/// Lifecycle of the assistant session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Engine created, dispatch loop not started.
    Idle,
    /// Dispatch loop consuming utterances.
    Running,
    /// Exit phrase or interrupt observed; loops are winding down.
    Stopping,
    /// Dispatch loop exited and background work has been released.
    Stopped,
}

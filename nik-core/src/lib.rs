//! # nik-core
//!
//! Dispatch core of the Nik desktop assistant.
//!
//! ## Architecture
//!
//! ```text
//! Microphone → VoiceCapture ─┐
//!                            ├─► InputChannel ─► dispatch loop ─► DispatchTable
//! UI text submit ────────────┘                        │
//!                                                OutputSink
//!                                     ┌───────────────┴──────────────┐
//!                               gui-update queue            speech worker (per reply)
//!                                 (UI thread)          synthesize → play → cleanup
//! ```
//!
//! `SessionState` is the single cooperative cancellation flag: every long-running
//! loop observes it within one poll interval.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod channel;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod interface;
pub mod ipc;
pub mod output;
pub mod responder;
pub mod session;
pub mod tasks;
pub mod utterance;
pub mod voice;

#[cfg(feature = "cloud")]
pub mod cloud;

// Convenience re-exports for downstream crates
pub use channel::{input_channel, InputReceiver, InputSender};
pub use dispatch::{is_exit_phrase, DispatchTable, FALLBACK_REPLY};
pub use engine::{AssistantEngine, EngineConfig, FAREWELL_REPLY, WELCOME_REPLY};
pub use error::{NikError, Result};
pub use interface::{InputInterface, OutputInterface};
pub use ipc::events::{SessionStatus, SessionStatusEvent, Speaker, StatusTone, UiUpdate};
pub use output::{OutputSink, SpeechOutput};
pub use responder::{Clock, Responder, SystemClock};
pub use session::SessionState;
pub use tasks::{TaskRunner, TaskState};
pub use utterance::{Reply, Utterance, UtteranceSource};
pub use voice::profile::VoiceProfile;

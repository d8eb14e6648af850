//! Ordered responder table: the only matching the assistant does.
//!
//! `resolve` walks responders in registration order and returns the first
//! capable one's reply. Cost is O(responders × keywords) per utterance, which
//! is fine for a handful of responders.
//!
//! Exit phrases never reach the table; the dispatch loop checks
//! [`is_exit_phrase`] first because an exit ends the session instead of
//! producing a conversational reply.

use std::sync::Arc;

use tracing::debug;

use crate::responder::{
    GreetingResponder, IdentityResponder, Responder, SharedClock, TimeResponder,
};
use crate::utterance::Reply;

/// Reply for utterances no responder claims.
pub const FALLBACK_REPLY: &str = "I'm sorry, I don't understand that. Could you please rephrase?";

/// Phrases that end the session (case-insensitive, exact match after trim).
pub const EXIT_PHRASES: &[&str] = &["exit", "quit", "bye", "goodbye"];

/// `true` if `text` is one of [`EXIT_PHRASES`] once trimmed and lower-cased.
pub fn is_exit_phrase(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    EXIT_PHRASES.contains(&normalized.as_str())
}

/// Responders in registration order. Append-only, read-only once shared.
#[derive(Default)]
pub struct DispatchTable {
    responders: Vec<Box<dyn Responder>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Greeting, time and identity responders, in that order.
    pub fn with_default_responders(clock: SharedClock) -> Self {
        let mut table = Self::new();
        table.register(GreetingResponder::new(Arc::clone(&clock)));
        table.register(TimeResponder::new(clock));
        table.register(IdentityResponder::new());
        table
    }

    /// Append a responder. No de-duplication: an earlier responder with an
    /// overlapping keyword keeps winning.
    pub fn register<R: Responder>(&mut self, responder: R) {
        self.responders.push(Box::new(responder));
    }

    /// Route `text` to the first capable responder, or the fallback reply.
    pub fn resolve(&self, text: &str) -> Reply {
        self.route(text).1
    }

    /// Like [`resolve`](Self::resolve), also naming the responder that
    /// matched. `None` means the fallback reply was used.
    pub fn route(&self, text: &str) -> (Option<&str>, Reply) {
        match self.responders.iter().find(|r| r.can_handle(text)) {
            Some(responder) => {
                debug!(responder = responder.id(), "utterance matched");
                (Some(responder.id()), responder.handle(text))
            }
            None => {
                debug!("no responder matched, using fallback");
                (None, Reply::new(FALLBACK_REPLY))
            }
        }
    }

    /// Responder ids in registration order.
    pub fn responder_ids(&self) -> Vec<&str> {
        self.responders.iter().map(|r| r.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.responders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responders.is_empty()
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("responders", &self.responder_ids())
            .finish()
    }
}

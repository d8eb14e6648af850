//! Greetings, aware of the time of day.
//!
//! Sub-pattern priority:
//! 1. `good morning`, `good afternoon`, `good evening` → matching fixed reply
//! 2. `hello`, `hi`, `hey`, `greetings` → random pick from [`GREETING_CANDIDATES`]
//! 3. anything else (e.g. `good day`) → salutation for the current day period

use chrono::Timelike;
use rand::seq::SliceRandom;

use super::{contains_any, DayPeriod, Responder, SharedClock, SystemClock};
use crate::utterance::Reply;

const KEYWORDS: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "greetings",
    "good morning",
    "good afternoon",
    "good evening",
    "good day",
];

const PLAIN_GREETINGS: &[&str] = &["hello", "hi", "hey", "greetings"];

/// Replies to a plain greeting word.
pub const GREETING_CANDIDATES: &[&str] = &[
    "Hello! I'm Nik, your personal AI assistant. How can I help you today?",
    "Hi there! What can I do for you?",
    "Hey! I'm here to help.",
    "Greetings! How may I assist you?",
];

const PERIOD_REPLIES: &[(&str, &str)] = &[
    ("good morning", "Good morning! How can I help you today?"),
    ("good afternoon", "Good afternoon! What can I do for you?"),
    ("good evening", "Good evening! How may I assist you?"),
];

pub struct GreetingResponder {
    clock: SharedClock,
}

impl GreetingResponder {
    pub fn new(clock: SharedClock) -> Self {
        Self { clock }
    }

    fn salutation(&self) -> String {
        let period = DayPeriod::from_hour(self.clock.now().hour());
        format!("Good {}! How can I assist you?", period.as_str())
    }
}

impl Default for GreetingResponder {
    fn default() -> Self {
        Self::new(std::sync::Arc::new(SystemClock))
    }
}

impl Responder for GreetingResponder {
    fn id(&self) -> &str {
        "greeting"
    }

    fn keywords(&self) -> &[&'static str] {
        KEYWORDS
    }

    fn handle(&self, text: &str) -> Reply {
        let text = text.to_lowercase();

        if let Some((_, reply)) = PERIOD_REPLIES
            .iter()
            .find(|(phrase, _)| text.contains(phrase))
        {
            return Reply::new(*reply);
        }

        if contains_any(&text, PLAIN_GREETINGS) {
            let pick = GREETING_CANDIDATES
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or(GREETING_CANDIDATES[0]);
            return Reply::new(pick);
        }

        Reply::new(self.salutation())
    }
}

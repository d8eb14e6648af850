//! Questions about the assistant itself.
//!
//! Priority: `name`, then `who made you` / `who created you`, then
//! `who are you`, then `what can you do`, else a generic introduction.

use super::{contains_any, Responder};
use crate::utterance::Reply;

const KEYWORDS: &[&str] = &[
    "who are you",
    "what are you",
    "your name",
    "who made you",
    "who created you",
    "what can you do",
    "identity",
    "yourself",
];

pub const NAME_REPLY: &str =
    "My name is Nik. I was created by my developer to be your personal AI assistant.";
pub const CREATOR_REPLY: &str = "I was created by my developer to be your helpful AI assistant. I'm here to make your life easier and more productive.";
pub const SELF_DESCRIPTION_REPLY: &str = "I am Nik, your personal AI assistant. I was created to help you with various tasks, answer your questions, and make your daily life more convenient.";
pub const CAPABILITIES_REPLY: &str = "I can help you with many things! I can tell you the time, date, greet you, and answer questions about myself. I'm constantly learning new skills to assist you better.";
pub const INTRODUCTION_REPLY: &str =
    "I'm Nik, your personal AI assistant. How can I help you today?";

#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityResponder;

impl IdentityResponder {
    pub fn new() -> Self {
        Self
    }
}

impl Responder for IdentityResponder {
    fn id(&self) -> &str {
        "identity"
    }

    fn keywords(&self) -> &[&'static str] {
        KEYWORDS
    }

    fn handle(&self, text: &str) -> Reply {
        let text = text.to_lowercase();
        let reply = if text.contains("name") {
            NAME_REPLY
        } else if contains_any(&text, &["who made you", "who created you"]) {
            CREATOR_REPLY
        } else if text.contains("who are you") {
            SELF_DESCRIPTION_REPLY
        } else if text.contains("what can you do") {
            CAPABILITIES_REPLY
        } else {
            INTRODUCTION_REPLY
        };
        Reply::new(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn who_are_you_gets_self_description() {
        let responder = IdentityResponder::new();
        assert!(responder.can_handle("Who are you?"));
        assert_eq!(responder.handle("who are you").as_str(), SELF_DESCRIPTION_REPLY);
    }

    #[test]
    fn name_outranks_other_sub_patterns() {
        let reply = IdentityResponder.handle("who are you and what is your name");
        assert_eq!(reply.as_str(), NAME_REPLY);
    }

    #[test]
    fn creator_and_capabilities() {
        assert_eq!(IdentityResponder.handle("who created you").as_str(), CREATOR_REPLY);
        assert_eq!(
            IdentityResponder.handle("so what can you do").as_str(),
            CAPABILITIES_REPLY
        );
    }

    #[test]
    fn keyword_without_sub_pattern_introduces_itself() {
        assert!(IdentityResponder.can_handle("tell me about yourself"));
        assert_eq!(
            IdentityResponder.handle("tell me about yourself").as_str(),
            INTRODUCTION_REPLY
        );
    }
}

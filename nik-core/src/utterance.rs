//! Typed text passed from the producers to the dispatch loop, and the replies it
//! hands to the output side.

use serde::{Deserialize, Serialize};

/// Where an utterance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UtteranceSource {
    /// Recognised speech from the voice-capture producer.
    Voice,
    /// Typed text submitted by the front end.
    Text,
    /// Produced by the input channel itself once the session has ended.
    Sentinel,
}

/// A single piece of recognised or typed text.
///
/// Created at capture time, consumed exactly once by the dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    text: String,
    source: UtteranceSource,
}

impl Utterance {
    pub fn voice(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: UtteranceSource::Voice,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: UtteranceSource::Text,
        }
    }

    /// The utterance returned by a blocked `pop` once the session stops.
    ///
    /// Its text is an exit phrase, so the dispatch loop handles it exactly like
    /// a spoken or typed "exit".
    pub fn exit_sentinel() -> Self {
        Self {
            text: "exit".into(),
            source: UtteranceSource::Sentinel,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> UtteranceSource {
        self.source
    }

    pub fn is_sentinel(&self) -> bool {
        self.source == UtteranceSource::Sentinel
    }
}

/// The answer to one utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub text: String,
    /// Named voice profile for the spoken rendition. `None` uses the sink's
    /// active profile.
    pub voice_profile: Option<String>,
}

impl Reply {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_profile: None,
        }
    }

    pub fn with_voice(mut self, profile: impl Into<String>) -> Self {
        self.voice_profile = Some(profile.into());
        self
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_reads_as_exit() {
        let sentinel = Utterance::exit_sentinel();
        assert_eq!(sentinel.as_str(), "exit");
        assert!(sentinel.is_sentinel());
        assert!(!Utterance::text("exit").is_sentinel());
    }

    #[test]
    fn reply_serializes_voice_profile_in_camel_case() {
        let reply = Reply::new("hi").with_voice("calm");
        let json = serde_json::to_value(&reply).expect("serialize reply");
        assert_eq!(json["text"], "hi");
        assert_eq!(json["voiceProfile"], "calm");
    }
}

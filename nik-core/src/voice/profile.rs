//! Named voice configurations for speech synthesis.

use serde::{Deserialize, Serialize};

use crate::error::{NikError, Result};

pub const SPEED_RANGE: (f32, f32) = (0.5, 2.0);
pub const PITCH_RANGE: (f32, f32) = (-1.0, 1.0);
pub const VOLUME_RANGE: (f32, f32) = (0.0, 1.0);

/// Parameters handed to the synthesizer for one reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceProfile {
    pub name: String,
    /// BCP-47-ish language tag, e.g. `en`, `en-uk`, `es`.
    pub language: String,
    /// Ask the engine for its slow speaking mode.
    pub slow: bool,
    /// Speaking rate multiplier in [0.5, 2.0].
    pub speed: f32,
    /// Pitch shift in [-1.0, 1.0].
    pub pitch: f32,
    /// Output gain in [0.0, 1.0].
    pub volume: f32,
}

/// (name, language, slow, speed, pitch, volume)
const REGISTRY: &[(&str, &str, bool, f32, f32, f32)] = &[
    ("default", "en", false, 1.0, 0.0, 1.0),
    ("slow", "en", true, 0.8, 0.0, 1.0),
    ("british", "en-uk", false, 1.0, 0.2, 1.0),
    ("australian", "en-au", false, 1.0, 0.1, 1.0),
    ("indian", "en-in", false, 1.1, -0.1, 1.0),
    ("spanish", "es", false, 1.0, 0.0, 1.0),
    ("french", "fr", false, 1.0, 0.0, 1.0),
    ("german", "de", false, 1.0, 0.0, 1.0),
    ("robot", "en", false, 0.9, 0.5, 0.8),
    ("whisper", "en", false, 0.8, -0.3, 0.6),
    ("excited", "en", false, 1.2, 0.3, 1.0),
    ("calm", "en", false, 0.9, -0.2, 0.9),
];

impl VoiceProfile {
    /// Look a profile up in the fixed registry.
    pub fn lookup(name: &str) -> Option<Self> {
        let wanted = name.trim().to_lowercase();
        REGISTRY
            .iter()
            .find(|(n, ..)| *n == wanted)
            .map(|&(name, language, slow, speed, pitch, volume)| Self {
                name: name.into(),
                language: language.into(),
                slow,
                speed,
                pitch,
                volume,
            })
    }

    /// Like [`lookup`](Self::lookup) but reports unknown names as an error.
    pub fn named(name: &str) -> Result<Self> {
        Self::lookup(name).ok_or_else(|| NikError::UnknownVoiceProfile(name.to_string()))
    }

    /// Registered profile names in registry order.
    pub fn names() -> impl Iterator<Item = &'static str> {
        REGISTRY.iter().map(|(name, ..)| *name)
    }

    /// Override individual parameters, clamping each into its range.
    pub fn with_parameters(mut self, speed: Option<f32>, pitch: Option<f32>, volume: Option<f32>) -> Self {
        if let Some(speed) = speed {
            self.speed = speed.clamp(SPEED_RANGE.0, SPEED_RANGE.1);
        }
        if let Some(pitch) = pitch {
            self.pitch = pitch.clamp(PITCH_RANGE.0, PITCH_RANGE.1);
        }
        if let Some(volume) = volume {
            self.volume = volume.clamp(VOLUME_RANGE.0, VOLUME_RANGE.1);
        }
        self
    }
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            name: "default".into(),
            language: "en".into(),
            slow: false,
            speed: 1.0,
            pitch: 0.0,
            volume: 1.0,
        }
    }
}

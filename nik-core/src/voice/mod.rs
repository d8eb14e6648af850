//! Voice in and voice out.
//!
//! - [`capture`]: the voice-capture producer thread (microphone → recognizer → input channel).
//! - [`synth`] + [`playback`]: reply → audio artifact → speakers.
//! - [`profile`] + [`prosody`]: how a reply should sound.

pub mod capture;
pub mod playback;
pub mod profile;
pub mod prosody;
pub mod synth;

pub use capture::{CaptureConfig, CaptureState, Recognizer, VoiceCapture};
pub use playback::AudioPlayer;
pub use profile::VoiceProfile;
pub use synth::{SpeechArtifact, SpeechSynthesizer};

//! OpenAI-compatible speech backends (feature `cloud`).
//!
//! Both use the blocking reqwest client: the recognizer runs on the capture
//! thread and the synthesizer on a speech worker, neither inside a runtime.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::blocking::{multipart, Client};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::audio::{wav::encode_wav_bytes, AudioClip};
use crate::error::{NikError, Result};
use crate::voice::capture::Recognizer;
use crate::voice::profile::{VoiceProfile, SPEED_RANGE};
use crate::voice::synth::{artifact_path, SpeechArtifact, SpeechSynthesizer};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_TRANSCRIBE_MODEL: &str = "gpt-4o-mini-transcribe";
pub const DEFAULT_SPEECH_MODEL: &str = "gpt-4o-mini-tts";
pub const DEFAULT_VOICE: &str = "alloy";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
/// Speed multiplier applied for profiles with `slow` set.
const SLOW_FACTOR: f32 = 0.75;

/// Endpoint + credentials shared by both backends.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub api_key: String,
    pub base_url: String,
    pub transcribe_model: String,
    pub speech_model: String,
    pub voice: String,
}

impl CloudConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            transcribe_model: DEFAULT_TRANSCRIBE_MODEL.into(),
            speech_model: DEFAULT_SPEECH_MODEL.into(),
            voice: DEFAULT_VOICE.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

fn client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| NikError::Other(e.into()))
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// Speech-to-text via `/v1/audio/transcriptions`.
pub struct OpenAiRecognizer {
    config: CloudConfig,
    client: Client,
}

impl OpenAiRecognizer {
    pub fn new(config: CloudConfig) -> Result<Self> {
        Ok(Self {
            config,
            client: client()?,
        })
    }
}

impl Recognizer for OpenAiRecognizer {
    fn recognize(&mut self, clip: &AudioClip) -> Result<String> {
        if clip.is_empty() {
            return Err(NikError::Unintelligible);
        }
        let wav = encode_wav_bytes(clip)?;
        let file_part = multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| NikError::ServiceUnavailable(e.to_string()))?;
        let form = multipart::Form::new()
            .text("model", self.config.transcribe_model.clone())
            .text("response_format", "json")
            .part("file", file_part);

        let response = self
            .client
            .post(self.config.endpoint("/v1/audio/transcriptions"))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .map_err(|e| NikError::ServiceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "transcription request rejected");
            return Err(NikError::ServiceUnavailable(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let payload: TranscriptionResponse = response
            .json()
            .map_err(|e| NikError::ServiceUnavailable(e.to_string()))?;
        let text = payload.text.trim();
        if text.is_empty() {
            return Err(NikError::Unintelligible);
        }
        debug!(chars = text.len(), secs = clip.duration_secs(), "transcription received");
        Ok(text.to_string())
    }
}

/// Text-to-speech via `/v1/audio/speech`, writing WAV artifacts to `dir`.
pub struct OpenAiSynthesizer {
    config: CloudConfig,
    client: Client,
    dir: PathBuf,
}

impl OpenAiSynthesizer {
    pub fn new(config: CloudConfig, dir: PathBuf) -> Result<Self> {
        Ok(Self {
            config,
            client: client()?,
            dir,
        })
    }
}

/// Request speed for `profile`; slow profiles are slowed further.
fn request_speed(profile: &VoiceProfile) -> f32 {
    let speed = if profile.slow {
        profile.speed * SLOW_FACTOR
    } else {
        profile.speed
    };
    speed.clamp(SPEED_RANGE.0, SPEED_RANGE.1)
}

impl SpeechSynthesizer for OpenAiSynthesizer {
    fn synthesize(&self, text: &str, profile: &VoiceProfile) -> Result<SpeechArtifact> {
        let body = serde_json::json!({
            "model": self.config.speech_model,
            "voice": self.config.voice,
            "input": text,
            "response_format": "wav",
            "speed": request_speed(profile),
        });

        let response = self
            .client
            .post(self.config.endpoint("/v1/audio/speech"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .map_err(|e| NikError::Synthesis(e.to_string()))?;
        if !response.status().is_success() {
            return Err(NikError::Synthesis(format!("HTTP {}", response.status())));
        }
        let audio = response
            .bytes()
            .map_err(|e| NikError::Synthesis(e.to_string()))?;

        let path = artifact_path(&self.dir);
        std::fs::write(&path, &audio)?;
        debug!(bytes = audio.len(), profile = profile.name.as_str(), "speech synthesized");
        Ok(SpeechArtifact::new(path))
    }
}

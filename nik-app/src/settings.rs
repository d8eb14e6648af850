//! Persistent application settings (JSON file in the user data directory).

use std::fs;
use std::path::{Path, PathBuf};

use nik_core::voice::profile::{PITCH_RANGE, SPEED_RANGE, VOLUME_RANGE};
use nik_core::{EngineConfig, VoiceProfile};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub voice_profile: String,
    pub voice_input_enabled: bool,
    pub speech_output_enabled: bool,
    pub preferred_input_device: Option<String>,
    pub energy_threshold: f32,
    /// Per-user overrides on top of the selected profile.
    pub speed: Option<f32>,
    pub pitch: Option<f32>,
    pub volume: Option<f32>,
    pub openai_api_key: Option<String>,
    pub cloud_opt_in: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            voice_profile: "default".into(),
            voice_input_enabled: true,
            speech_output_enabled: true,
            preferred_input_device: None,
            energy_threshold: 0.02,
            speed: None,
            pitch: None,
            volume: None,
            openai_api_key: None,
            cloud_opt_in: false,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.voice_profile = normalize_voice_profile(&self.voice_profile);
        self.energy_threshold = if self.energy_threshold.is_finite() {
            self.energy_threshold.clamp(0.001, 0.5)
        } else {
            0.02
        };
        self.speed = self.speed.map(|v| v.clamp(SPEED_RANGE.0, SPEED_RANGE.1));
        self.pitch = self.pitch.map(|v| v.clamp(PITCH_RANGE.0, PITCH_RANGE.1));
        self.volume = self.volume.map(|v| v.clamp(VOLUME_RANGE.0, VOLUME_RANGE.1));
        self.openai_api_key = self
            .openai_api_key
            .as_ref()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        self.preferred_input_device = self
            .preferred_input_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
    }

    /// The active profile with user overrides applied.
    pub fn voice(&self) -> VoiceProfile {
        self.engine_config()
            .voice()
            .with_parameters(self.speed, self.pitch, self.volume)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            energy_threshold: self.energy_threshold,
            voice_profile: self.voice_profile.clone(),
            ..EngineConfig::default()
        }
    }

    /// Cloud key, only when the user opted in.
    #[cfg(feature = "cloud")]
    pub fn cloud_key(&self) -> Option<&str> {
        if self.cloud_opt_in {
            self.openai_api_key.as_deref()
        } else {
            None
        }
    }
}

/// Unknown profile names fall back to `default`.
pub fn normalize_voice_profile(raw: &str) -> String {
    let name = raw.trim().to_lowercase();
    if VoiceProfile::lookup(&name).is_some() {
        name
    } else {
        if !name.is_empty() {
            warn!(profile = name.as_str(), "unknown voice profile in settings, using default");
        }
        "default".into()
    }
}

pub fn default_settings_path() -> PathBuf {
    data_dir().join("settings.json")
}

/// Per-user data directory; also holds speech artifacts.
pub fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Nik")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("nik")
    }
}

pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| match serde_json::from_str::<AppSettings>(&raw) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable settings file");
                None
            }
        })
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

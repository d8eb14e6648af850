//! Picks concrete speech backends from compiled features and settings.

use std::path::Path;

use nik_core::voice::capture::{Recognizer, SourceFactory};
use nik_core::{EngineConfig, SpeechOutput};
use tracing::{info, warn};

use crate::settings::AppSettings;

/// Microphone opened on the capture thread. Without `audio-cpal` the factory
/// reports a missing device, which disables voice input cleanly.
pub fn source_factory(settings: &AppSettings, config: &EngineConfig) -> SourceFactory {
    #[cfg(feature = "audio-cpal")]
    {
        let preferred = settings.preferred_input_device.clone();
        let phrase = config.phrase_config();
        Box::new(move || {
            let mic = nik_core::audio::microphone::MicrophoneSource::open(preferred.as_deref(), phrase)?;
            Ok(Box::new(mic) as Box<dyn nik_core::audio::AudioSource>)
        })
    }
    #[cfg(not(feature = "audio-cpal"))]
    {
        let _ = (settings, config);
        Box::new(|| {
            Err(nik_core::NikError::DeviceUnavailable(
                "built without audio-cpal".into(),
            ))
        })
    }
}

/// Speech-to-text backend, if one is configured.
pub fn recognizer(settings: &AppSettings) -> Option<Box<dyn Recognizer>> {
    #[cfg(feature = "cloud")]
    {
        if let Some(key) = settings.cloud_key() {
            match nik_core::cloud::OpenAiRecognizer::new(nik_core::cloud::CloudConfig::new(key)) {
                Ok(r) => {
                    info!("using cloud speech recognition");
                    return Some(Box::new(r));
                }
                Err(e) => warn!(error = %e, "cloud recognizer unavailable"),
            }
        }
    }
    let _ = settings;
    warn!("no speech recognizer configured; voice input disabled");
    None
}

/// Synthesizer + player pair, if both are available and speech is enabled.
pub fn speech_output(settings: &AppSettings, artifact_dir: &Path, config: &EngineConfig) -> Option<SpeechOutput> {
    if !settings.speech_output_enabled {
        info!("speech output disabled");
        return None;
    }

    #[cfg(all(feature = "cloud", feature = "audio-cpal"))]
    {
        if let Some(key) = settings.cloud_key() {
            let cloud = nik_core::cloud::CloudConfig::new(key);
            match nik_core::cloud::OpenAiSynthesizer::new(cloud, artifact_dir.to_path_buf()) {
                Ok(synth) => {
                    info!("using cloud speech synthesis");
                    let player = nik_core::voice::playback::CpalPlayer::new();
                    return Some(
                        SpeechOutput::new(std::sync::Arc::new(synth), std::sync::Arc::new(player))
                            .with_speak_delay(config.speak_delay),
                    );
                }
                Err(e) => warn!(error = %e, "cloud synthesizer unavailable"),
            }
        }
    }

    let _ = (artifact_dir, config);
    warn!("no speech synthesizer configured; replies are text-only");
    None
}

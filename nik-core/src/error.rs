use thiserror::Error;

/// All errors produced by nik-core.
#[derive(Debug, Error)]
pub enum NikError {
    #[error("speech was not intelligible")]
    Unintelligible,

    #[error("recognition service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("audio playback failed: {0}")]
    Playback(String),

    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("unknown voice profile: {0}")]
    UnknownVoiceProfile(String),

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, NikError>;

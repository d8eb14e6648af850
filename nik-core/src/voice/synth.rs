//! Speech synthesis seam and the transient audio artifacts it produces.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use super::profile::VoiceProfile;
use crate::error::Result;

const ARTIFACT_PREFIX: &str = "nik-speech-";

/// Artifacts older than this are considered abandoned by [`sweep_stale_artifacts`].
pub const STALE_AFTER: Duration = Duration::from_secs(10 * 60);

static ARTIFACT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Text-to-speech backend.
///
/// Implementations are called from short-lived speech workers, possibly
/// several at once.
pub trait SpeechSynthesizer: Send + Sync + 'static {
    /// Render `text` with `profile` into a playable audio file.
    fn synthesize(&self, text: &str, profile: &VoiceProfile) -> Result<SpeechArtifact>;

    /// Whether `text` may contain emphasis/break markup.
    fn supports_markup(&self) -> bool {
        false
    }
}

/// A temporary audio file owned by one speech worker.
///
/// Removed on [`cleanup`](Self::cleanup) or, failing that, on drop.
#[derive(Debug)]
pub struct SpeechArtifact {
    path: PathBuf,
    removed: bool,
}

impl SpeechArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now and report failure.
    pub fn cleanup(mut self) -> Result<()> {
        self.removed = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for SpeechArtifact {
    fn drop(&mut self) {
        if !self.removed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// A fresh, unique artifact path inside `dir`.
pub fn artifact_path(dir: &Path) -> PathBuf {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let n = ARTIFACT_COUNTER.fetch_add(1, Ordering::Relaxed);
    dir.join(format!(
        "{ARTIFACT_PREFIX}{}-{millis}-{n}.wav",
        std::process::id()
    ))
}

/// Remove speech artifacts in `dir` older than `max_age`, left behind by
/// crashed or killed workers. Returns how many files were removed.
pub fn sweep_stale_artifacts(dir: &Path, max_age: Duration) -> Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(ARTIFACT_PREFIX) {
            continue;
        }
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age < max_age {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %entry.path().display(), error = %e, "failed to remove stale artifact"),
        }
    }
    debug!(removed, dir = %dir.display(), "artifact sweep finished");
    Ok(removed)
}

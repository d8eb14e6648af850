//! Output sink: visual update first, speech later.
//!
//! `emit` pushes the reply onto the gui-update queue synchronously, so the
//! transcript order always equals emit order. Speech runs on a fire-and-forget
//! worker per reply (delay → synthesize → play → remove artifact). Workers are
//! never joined and may overlap, so spoken order is unspecified. They are
//! counted, so a host can wait for the last reply to finish before exiting.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::engine::FAREWELL_REPLY;
use crate::interface::OutputInterface;
use crate::ipc::events::{Speaker, UiUpdate};
use crate::ipc::UiSender;
use crate::utterance::Reply;
use crate::voice::playback::AudioPlayer;
use crate::voice::profile::VoiceProfile;
use crate::voice::prosody;
use crate::voice::synth::SpeechSynthesizer;

const IDLE_POLL: Duration = Duration::from_millis(10);

/// Gap between the visual update and the start of synthesis.
pub const DEFAULT_SPEAK_DELAY: Duration = Duration::from_millis(500);

/// Synthesis + playback backends for spoken replies.
#[derive(Clone)]
pub struct SpeechOutput {
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub player: Arc<dyn AudioPlayer>,
    pub speak_delay: Duration,
}

impl SpeechOutput {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, player: Arc<dyn AudioPlayer>) -> Self {
        Self {
            synthesizer,
            player,
            speak_delay: DEFAULT_SPEAK_DELAY,
        }
    }

    pub fn with_speak_delay(mut self, delay: Duration) -> Self {
        self.speak_delay = delay;
        self
    }

    /// Body of one speech worker. Every failure is logged and swallowed.
    fn speak(&self, text: &str, profile: &VoiceProfile, diagnostics: &SpeechDiagnostics) {
        std::thread::sleep(self.speak_delay);

        let rendered = if self.synthesizer.supports_markup() {
            prosody::to_markup(text)
        } else {
            text.to_string()
        };

        let artifact = match self.synthesizer.synthesize(&rendered, profile) {
            Ok(artifact) => artifact,
            Err(e) => {
                diagnostics.synthesis_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, profile = profile.name.as_str(), "speech synthesis failed");
                return;
            }
        };

        match self.player.play(&artifact, profile.volume) {
            Ok(()) => {
                diagnostics.spoken.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                diagnostics.playback_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "speech playback failed");
            }
        }

        if let Err(e) = artifact.cleanup() {
            warn!(error = %e, "failed to remove speech artifact");
        }
    }
}

/// Decrements the in-flight count when a worker ends, panics included.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(count))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Default)]
pub struct SpeechDiagnostics {
    pub emitted: AtomicUsize,
    pub spoken: AtomicUsize,
    pub synthesis_failures: AtomicUsize,
    pub playback_failures: AtomicUsize,
}

impl SpeechDiagnostics {
    pub fn snapshot(&self) -> SpeechDiagnosticsSnapshot {
        SpeechDiagnosticsSnapshot {
            emitted: self.emitted.load(Ordering::Relaxed),
            spoken: self.spoken.load(Ordering::Relaxed),
            synthesis_failures: self.synthesis_failures.load(Ordering::Relaxed),
            playback_failures: self.playback_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechDiagnosticsSnapshot {
    pub emitted: usize,
    pub spoken: usize,
    pub synthesis_failures: usize,
    pub playback_failures: usize,
}

/// Delivers replies to the visual surface and the speakers.
///
/// Cloning shares the active profile, teardown flag and counters, so the
/// front end can keep a clone for `select_voice` while the dispatch loop owns
/// another.
#[derive(Clone)]
pub struct OutputSink {
    ui: UiSender,
    speech: Option<SpeechOutput>,
    profile: Arc<RwLock<VoiceProfile>>,
    teardown: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
    diagnostics: Arc<SpeechDiagnostics>,
}

impl OutputSink {
    /// `speech: None` gives a text-only sink.
    pub fn new(ui: UiSender, speech: Option<SpeechOutput>) -> Self {
        Self {
            ui,
            speech,
            profile: Arc::new(RwLock::new(VoiceProfile::default())),
            teardown: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            diagnostics: Arc::new(SpeechDiagnostics::default()),
        }
    }

    pub fn with_profile(self, profile: VoiceProfile) -> Self {
        *self.profile.write() = profile;
        self
    }

    /// Show `reply` now and schedule it to be spoken.
    pub fn emit(&self, reply: &Reply) {
        self.diagnostics.emitted.fetch_add(1, Ordering::Relaxed);
        if self
            .ui
            .send(UiUpdate::message(Speaker::Assistant, reply.as_str()))
            .is_err()
        {
            debug!("gui-update queue closed");
        }

        if reply.as_str() == FAREWELL_REPLY && !self.teardown.swap(true, Ordering::AcqRel) {
            info!("farewell emitted, teardown armed");
        }

        let Some(speech) = self.speech.clone() else {
            return;
        };
        let profile = self.profile_for(reply);
        let text = reply.text.clone();
        let diagnostics = Arc::clone(&self.diagnostics);
        // Counted before the thread exists so `wait_idle` never misses it.
        let guard = InFlight::enter(&self.in_flight);
        let spawned = std::thread::Builder::new()
            .name("nik-speech".into())
            .spawn(move || {
                let _guard = guard;
                speech.speak(&text, &profile, &diagnostics);
            });
        if let Err(e) = spawned {
            warn!(error = %e, "failed to start speech worker");
        }
    }

    /// Switch the active profile. Unknown names leave it unchanged.
    pub fn select_voice(&self, name: &str) -> bool {
        match VoiceProfile::named(name) {
            Ok(profile) => {
                info!(profile = profile.name.as_str(), "voice profile selected");
                *self.profile.write() = profile;
                true
            }
            Err(e) => {
                warn!(error = %e, "voice profile not changed");
                false
            }
        }
    }

    /// Speech workers that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Block until every speech worker has finished or `timeout` passes.
    /// Returns `true` when none are left.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.in_flight() == 0 {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(remaining = self.in_flight(), "speech workers still running");
                return false;
            }
            std::thread::sleep(IDLE_POLL.min(deadline - now));
        }
    }

    pub fn active_profile(&self) -> VoiceProfile {
        self.profile.read().clone()
    }

    /// `true` once the farewell reply has been emitted.
    pub fn teardown_armed(&self) -> bool {
        self.teardown.load(Ordering::Acquire)
    }

    pub fn speaks(&self) -> bool {
        self.speech.is_some()
    }

    pub fn diagnostics(&self) -> SpeechDiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    fn profile_for(&self, reply: &Reply) -> VoiceProfile {
        match reply.voice_profile.as_deref() {
            Some(name) => VoiceProfile::lookup(name).unwrap_or_else(|| {
                warn!(profile = name, "reply asked for unknown voice profile, using active one");
                self.active_profile()
            }),
            None => self.active_profile(),
        }
    }
}

impl OutputInterface for OutputSink {
    fn output(&mut self, reply: &Reply) {
        self.emit(reply);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NikError, Result};
    use crate::ipc::ui_channel;
    use crate::voice::synth::{artifact_path, SpeechArtifact};
    use parking_lot::Mutex;
    use std::path::PathBuf;

    struct RecordingSynth {
        dir: PathBuf,
        seen: Mutex<Vec<(String, String)>>,
        markup: bool,
    }

    impl SpeechSynthesizer for RecordingSynth {
        fn synthesize(&self, text: &str, profile: &VoiceProfile) -> Result<SpeechArtifact> {
            self.seen.lock().push((text.to_string(), profile.name.clone()));
            let path = artifact_path(&self.dir);
            std::fs::write(&path, b"RIFF")?;
            Ok(SpeechArtifact::new(path))
        }

        fn supports_markup(&self) -> bool {
            self.markup
        }
    }

    struct FailingSynth;

    impl SpeechSynthesizer for FailingSynth {
        fn synthesize(&self, _text: &str, _profile: &VoiceProfile) -> Result<SpeechArtifact> {
            Err(NikError::Synthesis("engine offline".into()))
        }
    }

    #[derive(Default)]
    struct RecordingPlayer {
        played: Mutex<Vec<(PathBuf, f32)>>,
    }

    impl AudioPlayer for RecordingPlayer {
        fn play(&self, artifact: &SpeechArtifact, volume: f32) -> Result<()> {
            assert!(artifact.path().exists(), "artifact must exist during playback");
            self.played.lock().push((artifact.path().to_path_buf(), volume));
            Ok(())
        }
    }

    fn wait_until(cond: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(2) {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn visual_order_matches_emit_order_and_speech_follows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let synth = Arc::new(RecordingSynth {
            dir: dir.path().to_path_buf(),
            seen: Mutex::new(Vec::new()),
            markup: false,
        });
        let player = Arc::new(RecordingPlayer::default());
        let (ui_tx, ui_rx) = ui_channel();
        let speech = SpeechOutput::new(synth.clone(), player.clone()).with_speak_delay(Duration::ZERO);
        let sink = OutputSink::new(ui_tx, Some(speech));

        sink.emit(&Reply::new("first"));
        sink.emit(&Reply::new("second").with_voice("whisper"));

        let shown: Vec<_> = ui_rx.try_iter().collect();
        assert_eq!(
            shown,
            vec![
                UiUpdate::message(Speaker::Assistant, "first"),
                UiUpdate::message(Speaker::Assistant, "second"),
            ]
        );

        assert!(wait_until(|| sink.diagnostics().spoken == 2));
        let mut seen = synth.seen.lock().clone();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("first".to_string(), "default".to_string()),
                ("second".to_string(), "whisper".to_string()),
            ]
        );
        let volumes: Vec<f32> = player.played.lock().iter().map(|(_, v)| *v).collect();
        assert!(volumes.contains(&0.6));
        // Artifacts are gone once workers finish.
        assert!(wait_until(|| std::fs::read_dir(dir.path()).map(|d| d.count() == 0).unwrap_or(false)));
    }

    #[test]
    fn synthesis_failure_keeps_the_reply_visible() {
        let (ui_tx, ui_rx) = ui_channel();
        let speech = SpeechOutput::new(Arc::new(FailingSynth), Arc::new(RecordingPlayer::default()))
            .with_speak_delay(Duration::ZERO);
        let sink = OutputSink::new(ui_tx, Some(speech));

        sink.emit(&Reply::new("still shown"));
        assert_eq!(
            ui_rx.try_recv().ok(),
            Some(UiUpdate::message(Speaker::Assistant, "still shown"))
        );
        assert!(wait_until(|| sink.diagnostics().synthesis_failures == 1));
        assert_eq!(sink.diagnostics().spoken, 0);
    }

    #[test]
    fn markup_only_for_engines_that_support_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let synth = Arc::new(RecordingSynth {
            dir: dir.path().to_path_buf(),
            seen: Mutex::new(Vec::new()),
            markup: true,
        });
        let (ui_tx, _ui_rx) = ui_channel();
        let speech = SpeechOutput::new(synth.clone(), Arc::new(RecordingPlayer::default()))
            .with_speak_delay(Duration::ZERO);
        let sink = OutputSink::new(ui_tx, Some(speech));

        sink.emit(&Reply::new("Hi, there."));
        assert!(wait_until(|| sink.diagnostics().spoken == 1));
        let seen = synth.seen.lock();
        assert!(seen[0].0.contains("<break"), "{:?}", seen[0]);
    }

    struct SlowPlayer(Duration);

    impl AudioPlayer for SlowPlayer {
        fn play(&self, _artifact: &SpeechArtifact, _volume: f32) -> Result<()> {
            std::thread::sleep(self.0);
            Ok(())
        }
    }

    #[test]
    fn host_can_wait_for_the_farewell_to_be_spoken() {
        let dir = tempfile::tempdir().expect("tempdir");
        let synth = Arc::new(RecordingSynth {
            dir: dir.path().to_path_buf(),
            seen: Mutex::new(Vec::new()),
            markup: false,
        });
        let (ui_tx, _ui_rx) = ui_channel();
        let speech = SpeechOutput::new(synth, Arc::new(SlowPlayer(Duration::from_millis(300))))
            .with_speak_delay(Duration::from_millis(100));
        let sink = OutputSink::new(ui_tx, Some(speech));

        sink.emit(&Reply::new(FAREWELL_REPLY));
        assert!(sink.teardown_armed());
        assert_eq!(sink.in_flight(), 1);
        assert!(!sink.wait_idle(Duration::ZERO));

        assert!(sink.wait_idle(Duration::from_secs(5)));
        assert_eq!(sink.in_flight(), 0);
        assert_eq!(sink.diagnostics().spoken, 1);
        let left = std::fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(left, 0);
    }

    #[test]
    fn text_only_sink_is_always_idle() {
        let (ui_tx, _ui_rx) = ui_channel();
        let sink = OutputSink::new(ui_tx, None);
        sink.emit(&Reply::new("no voice"));
        assert_eq!(sink.in_flight(), 0);
        assert!(sink.wait_idle(Duration::ZERO));
    }

    #[test]
    fn farewell_arms_teardown() {
        let (ui_tx, _ui_rx) = ui_channel();
        let sink = OutputSink::new(ui_tx, None);
        sink.emit(&Reply::new("Hello!"));
        assert!(!sink.teardown_armed());
        sink.emit(&Reply::new(FAREWELL_REPLY));
        assert!(sink.teardown_armed());
        assert!(!sink.speaks());
    }

    #[test]
    fn unknown_voice_leaves_profile_unchanged() {
        let (ui_tx, _ui_rx) = ui_channel();
        let sink = OutputSink::new(ui_tx, None);
        assert!(sink.select_voice("robot"));
        assert_eq!(sink.active_profile().name, "robot");
        assert!(!sink.select_voice("pirate"));
        assert_eq!(sink.active_profile().name, "robot");
    }
}

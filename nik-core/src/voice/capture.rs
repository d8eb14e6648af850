//! Voice-capture producer.
//!
//! ## State machine (per cycle)
//!
//! ```text
//! Idle ──enabled──► Listening ──phrase──► Processing ──text──► Idle
//!                       │  ▲                   │
//!                 timeout  └──────── back-off ─┴──failure──► Error
//! ```
//!
//! Recognized text is lower-cased and pushed onto the input channel, and the
//! original text is echoed to the transcript. Recognition failures report a
//! status line, back off and retry. A missing device disables voice input and
//! ends the thread; the text path keeps working.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::audio::{AudioClip, AudioSource, ListenWindow};
use crate::channel::InputSender;
use crate::error::{NikError, Result};
use crate::ipc::events::{Speaker, StatusTone, UiUpdate};
use crate::ipc::UiSender;
use crate::session::SessionState;
use crate::utterance::Utterance;

pub const STATUS_LISTENING: &str = "Voice Input Active - Listening...";
pub const STATUS_PROCESSING: &str = "Voice Input Active - Processing...";
pub const STATUS_UNINTELLIGIBLE: &str = "Voice Input Active - Could not understand";
pub const STATUS_SERVICE_ERROR: &str = "Voice Input Active - Service error";
pub const STATUS_INACTIVE: &str = "Voice Input Inactive";
pub const STATUS_NO_MICROPHONE: &str = "No microphone detected";

/// How often a disabled producer re-checks the toggle.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Speech-to-text backend. Owned by the capture thread.
pub trait Recognizer: Send + 'static {
    /// # Errors
    /// `Unintelligible` / `ServiceUnavailable` are retried next cycle; any
    /// other error is reported and retried as well.
    fn recognize(&mut self, clip: &AudioClip) -> Result<String>;
}

/// Builds the audio source on the capture thread (cpal streams are `!Send`).
pub type SourceFactory = Box<dyn FnOnce() -> Result<Box<dyn AudioSource>> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Listening,
    Processing,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    pub listen_timeout: Duration,
    pub phrase_time_limit: Duration,
    pub error_backoff: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            listen_timeout: Duration::from_secs(5),
            phrase_time_limit: Duration::from_secs(5),
            error_backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Default)]
pub struct CaptureDiagnostics {
    pub listens: AtomicUsize,
    pub timeouts: AtomicUsize,
    pub phrases: AtomicUsize,
    pub recognized: AtomicUsize,
    pub recognition_errors: AtomicUsize,
}

impl CaptureDiagnostics {
    pub fn snapshot(&self) -> CaptureDiagnosticsSnapshot {
        CaptureDiagnosticsSnapshot {
            listens: self.listens.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            phrases: self.phrases.load(Ordering::Relaxed),
            recognized: self.recognized.load(Ordering::Relaxed),
            recognition_errors: self.recognition_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureDiagnosticsSnapshot {
    pub listens: usize,
    pub timeouts: usize,
    pub phrases: usize,
    pub recognized: usize,
    pub recognition_errors: usize,
}

/// Flags shared between the handle and the capture thread.
struct Shared {
    enabled: AtomicBool,
    device_missing: AtomicBool,
    state: Mutex<CaptureState>,
    diagnostics: CaptureDiagnostics,
    ui: UiSender,
}

impl Shared {
    fn status(&self, text: impl Into<String>, tone: StatusTone) {
        let _ = self.ui.send(UiUpdate::status(text, tone));
    }

    fn indicator(&self, active: bool) {
        let _ = self.ui.send(UiUpdate::VoiceInput { active });
    }

    /// Returns `true` when the state actually changed.
    fn transition(&self, next: CaptureState) -> bool {
        let mut state = self.state.lock();
        if *state == next {
            return false;
        }
        debug!(from = ?*state, to = ?next, "capture state");
        *state = next;
        true
    }
}

/// Handle to the voice-capture thread.
pub struct VoiceCapture {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl VoiceCapture {
    /// Start the producer thread. The audio source is opened lazily, the
    /// first time voice input is enabled.
    pub fn spawn(
        config: CaptureConfig,
        session: SessionState,
        input: InputSender,
        ui: UiSender,
        source_factory: SourceFactory,
        recognizer: Box<dyn Recognizer>,
        enabled: bool,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            enabled: AtomicBool::new(enabled),
            device_missing: AtomicBool::new(false),
            state: Mutex::new(CaptureState::Idle),
            diagnostics: CaptureDiagnostics::default(),
            ui,
        });
        if !enabled {
            shared.status(STATUS_INACTIVE, StatusTone::Alert);
        }
        shared.indicator(enabled);

        let ctx = CaptureContext {
            config,
            session,
            input,
            shared: Arc::clone(&shared),
            recognizer,
        };
        let handle = std::thread::Builder::new()
            .name("nik-voice".into())
            .spawn(move || run(ctx, source_factory))?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Switch voice input on or off. Returns whether voice input is now on.
    pub fn set_enabled(&self, on: bool) -> bool {
        if on && self.shared.device_missing.load(Ordering::Acquire) {
            self.shared.status(STATUS_NO_MICROPHONE, StatusTone::Alert);
            self.shared.indicator(false);
            return false;
        }
        let was = self.shared.enabled.swap(on, Ordering::AcqRel);
        if was != on {
            info!(enabled = on, "voice input toggled");
            if !on {
                self.shared.status(STATUS_INACTIVE, StatusTone::Alert);
            }
            self.shared.indicator(on);
        }
        on
    }

    pub fn toggle(&self) -> bool {
        self.set_enabled(!self.is_enabled())
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    pub fn state(&self) -> CaptureState {
        *self.shared.state.lock()
    }

    pub fn diagnostics(&self) -> CaptureDiagnosticsSnapshot {
        self.shared.diagnostics.snapshot()
    }

    /// `false` once the thread has exited (session over or device gone).
    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for the thread to exit. Call after the session has terminated.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("voice capture thread panicked");
            }
        }
    }
}

struct CaptureContext {
    config: CaptureConfig,
    session: SessionState,
    input: InputSender,
    shared: Arc<Shared>,
    recognizer: Box<dyn Recognizer>,
}

impl CaptureContext {
    fn voice_enabled(&self) -> bool {
        self.session.is_running() && self.shared.enabled.load(Ordering::Acquire)
    }

    fn report_error(&self, text: impl Into<String>) {
        self.shared.transition(CaptureState::Error);
        self.shared.diagnostics.recognition_errors.fetch_add(1, Ordering::Relaxed);
        self.shared.status(text, StatusTone::Alert);
        self.session.sleep(self.config.error_backoff);
    }

    fn device_lost(&self, reason: &str) {
        warn!(reason, "voice input disabled: no usable microphone");
        self.shared.device_missing.store(true, Ordering::Release);
        self.shared.enabled.store(false, Ordering::Release);
        self.shared.transition(CaptureState::Error);
        self.shared.status(STATUS_NO_MICROPHONE, StatusTone::Alert);
        self.shared.indicator(false);
    }

    fn handle_clip(&mut self, clip: &AudioClip) {
        self.shared.diagnostics.phrases.fetch_add(1, Ordering::Relaxed);
        self.shared.transition(CaptureState::Processing);
        self.shared.status(STATUS_PROCESSING, StatusTone::Busy);

        let outcome = self.recognizer.recognize(clip).and_then(|text| {
            let text = text.trim().to_string();
            if text.is_empty() {
                Err(NikError::Unintelligible)
            } else {
                Ok(text)
            }
        });

        match outcome {
            Ok(text) => {
                self.shared.diagnostics.recognized.fetch_add(1, Ordering::Relaxed);
                debug!(chars = text.len(), "voice utterance recognized");
                let _ = self.shared.ui.send(UiUpdate::message(Speaker::User, text.as_str()));
                self.input.push(Utterance::voice(text.to_lowercase()));
                self.shared.transition(CaptureState::Idle);
            }
            Err(NikError::Unintelligible) => self.report_error(STATUS_UNINTELLIGIBLE),
            Err(NikError::ServiceUnavailable(e)) => {
                warn!(error = %e, "recognition service unavailable");
                self.report_error(STATUS_SERVICE_ERROR);
            }
            Err(e) => {
                warn!(error = %e, "recognition failed");
                self.report_error(format!("Voice Input Error: {e}"));
            }
        }
    }
}

fn run(mut ctx: CaptureContext, source_factory: SourceFactory) {
    info!("voice capture thread started");
    let mut factory = Some(source_factory);
    let mut source: Option<Box<dyn AudioSource>> = None;
    let window = ListenWindow {
        timeout: ctx.config.listen_timeout,
        phrase_limit: ctx.config.phrase_time_limit,
    };

    while ctx.session.is_running() {
        if !ctx.shared.enabled.load(Ordering::Acquire) {
            ctx.shared.transition(CaptureState::Idle);
            ctx.session.sleep(IDLE_POLL);
            continue;
        }

        if source.is_none() {
            let Some(open) = factory.take() else { break };
            match open() {
                Ok(opened) => source = Some(opened),
                Err(e) => {
                    ctx.device_lost(&e.to_string());
                    break;
                }
            }
        }
        let Some(active) = source.as_mut() else { break };

        if ctx.shared.transition(CaptureState::Listening) {
            ctx.shared.status(STATUS_LISTENING, StatusTone::Active);
        }
        ctx.shared.diagnostics.listens.fetch_add(1, Ordering::Relaxed);

        let heard = {
            let keep_going = || ctx.voice_enabled();
            active.listen(window, &keep_going)
        };
        match heard {
            Ok(None) => {
                ctx.shared.diagnostics.timeouts.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Some(clip)) => ctx.handle_clip(&clip),
            Err(NikError::DeviceUnavailable(reason)) => {
                ctx.device_lost(&reason);
                break;
            }
            Err(e) => {
                warn!(error = %e, "listen failed");
                ctx.report_error(format!("Voice Input Error: {e}"));
            }
        }
    }

    // Device handles are released on this thread.
    drop(source);
    info!("voice capture thread exited");
}

//! `AssistantEngine`: session controller and owner of the dispatch loop.
//!
//! ## Lifecycle
//!
//! ```text
//! AssistantEngine::new()      status = Idle, session running
//!     └─► start(input, output)  task runner + dispatch thread, status = Running
//!         └─► exit phrase | stop()   running=false, status = Stopping
//!             └─► dispatch loop exits → task runner stopped, status = Stopped
//! ```
//!
//! A session is single-use: once terminated, `start()` returns
//! `NikError::NotRunning`. Calling `start()` twice returns `AlreadyRunning`.
//!
//! The engine owns the exit decision. Front ends observe `session()` and the
//! status broadcast; they never flip the flag behind the engine's back except
//! through `stop()`.

pub mod dispatch;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::{
    audio::phrase::PhraseConfig,
    channel::{input_channel, InputReceiver, InputSender, DEFAULT_POLL_INTERVAL},
    dispatch::DispatchTable,
    error::{NikError, Result},
    interface::{InputInterface, OutputInterface},
    ipc::events::{SessionStatus, SessionStatusEvent},
    output::DEFAULT_SPEAK_DELAY,
    session::SessionState,
    tasks::{TaskRunner, TaskState, DEFAULT_TICK},
    voice::{capture::CaptureConfig, profile::VoiceProfile},
};

pub use dispatch::{DispatchDiagnostics, DispatchSnapshot};

/// Emitted once when the dispatch loop starts.
pub const WELCOME_REPLY: &str =
    "Hello! I'm Nik, your personal AI assistant. How can I help you today?";

/// Emitted on an exit phrase. The output sink arms teardown when it sees it.
pub const FAREWELL_REPLY: &str = "Goodbye! Have a great day!";

/// Status broadcast capacity.
const STATUS_CAP: usize = 64;

/// Configuration for `AssistantEngine` and the producers it feeds.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Slice the dispatch loop waits on the input channel before re-checking
    /// the session flag. Default: 200 ms.
    pub input_poll_interval: Duration,
    /// Task runner wake-up period. Default: 100 ms.
    pub task_tick: Duration,
    /// Give up on a listen if no phrase starts in this time. Default: 5 s.
    pub listen_timeout: Duration,
    /// Maximum phrase length. Default: 5 s.
    pub phrase_time_limit: Duration,
    /// Trailing silence that ends a phrase. Default: 0.8 s.
    pub pause_threshold: Duration,
    /// Initial speech energy threshold (RMS). Default: 0.02.
    pub energy_threshold: f32,
    /// Adapt the energy threshold to background noise. Default: true.
    pub dynamic_energy: bool,
    /// Pause after a recognition failure. Default: 1 s.
    pub error_backoff: Duration,
    /// Gap between showing a reply and speaking it. Default: 500 ms.
    pub speak_delay: Duration,
    /// Active voice profile at start-up. Default: `"default"`.
    pub voice_profile: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            input_poll_interval: DEFAULT_POLL_INTERVAL,
            task_tick: DEFAULT_TICK,
            listen_timeout: Duration::from_secs(5),
            phrase_time_limit: Duration::from_secs(5),
            pause_threshold: Duration::from_millis(800),
            energy_threshold: 0.02,
            dynamic_energy: true,
            error_backoff: Duration::from_secs(1),
            speak_delay: DEFAULT_SPEAK_DELAY,
            voice_profile: "default".into(),
        }
    }
}

impl EngineConfig {
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            listen_timeout: self.listen_timeout,
            phrase_time_limit: self.phrase_time_limit,
            error_backoff: self.error_backoff,
        }
    }

    /// The start-up voice profile; unknown names fall back to `default`.
    pub fn voice(&self) -> VoiceProfile {
        VoiceProfile::lookup(&self.voice_profile).unwrap_or_default()
    }

    pub fn phrase_config(&self) -> PhraseConfig {
        PhraseConfig {
            energy_threshold: self.energy_threshold,
            dynamic_energy: self.dynamic_energy,
            pause_threshold: self.pause_threshold,
        }
    }
}

/// Canonical status plus its broadcast, shared with the dispatch thread.
pub(crate) struct StatusReporter {
    status: Mutex<SessionStatus>,
    tx: broadcast::Sender<SessionStatusEvent>,
}

impl StatusReporter {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(STATUS_CAP);
        Self {
            status: Mutex::new(SessionStatus::Idle),
            tx,
        }
    }

    pub(crate) fn set(&self, status: SessionStatus, detail: Option<String>) {
        *self.status.lock() = status;
        let _ = self.tx.send(SessionStatusEvent { status, detail });
    }

    fn get(&self) -> SessionStatus {
        *self.status.lock()
    }
}

/// Slot for the task runner; `None` before start and after teardown.
pub(crate) type SharedTasks = Arc<Mutex<Option<TaskRunner>>>;

/// The top-level engine handle. `Send + Sync`; share it behind an `Arc`.
pub struct AssistantEngine {
    config: EngineConfig,
    table: Arc<DispatchTable>,
    session: SessionState,
    started: AtomicBool,
    status: Arc<StatusReporter>,
    tasks: SharedTasks,
    diagnostics: Arc<DispatchDiagnostics>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl AssistantEngine {
    /// Create the engine and its session. Nothing runs until `start()`.
    pub fn new(config: EngineConfig, table: DispatchTable) -> Self {
        info!(responders = ?table.responder_ids(), "assistant engine created");
        Self {
            config,
            table: Arc::new(table),
            session: SessionState::new(),
            started: AtomicBool::new(false),
            status: Arc::new(StatusReporter::new()),
            tasks: Arc::new(Mutex::new(None)),
            diagnostics: Arc::new(DispatchDiagnostics::default()),
            dispatch: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The session flag every producer must observe.
    pub fn session(&self) -> SessionState {
        self.session.clone()
    }

    /// A fresh input channel bound to this session.
    pub fn input_channel(&self) -> (InputSender, InputReceiver) {
        input_channel(self.session.clone(), self.config.input_poll_interval)
    }

    /// Start the task runner and the dispatch thread.
    ///
    /// # Errors
    /// - `NikError::AlreadyRunning` if already started.
    /// - `NikError::NotRunning` if the session has already ended.
    /// - `NikError::Io` if a thread cannot be spawned.
    pub fn start<I, O>(&self, input: I, output: O) -> Result<()>
    where
        I: InputInterface + 'static,
        O: OutputInterface + 'static,
    {
        if !self.session.is_running() {
            return Err(NikError::NotRunning);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(NikError::AlreadyRunning);
        }

        let runner = TaskRunner::spawn(self.config.task_tick, self.session.clone())?;
        *self.tasks.lock() = Some(runner);

        let ctx = dispatch::DispatchContext {
            table: Arc::clone(&self.table),
            session: self.session.clone(),
            input: Box::new(input),
            output: Box::new(output),
            status: Arc::clone(&self.status),
            tasks: Arc::clone(&self.tasks),
            diagnostics: Arc::clone(&self.diagnostics),
        };

        self.status.set(SessionStatus::Running, None);
        let spawned = std::thread::Builder::new()
            .name("nik-dispatch".into())
            .spawn(move || dispatch::run(ctx));

        match spawned {
            Ok(handle) => {
                *self.dispatch.lock() = Some(handle);
                info!("engine started");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to start dispatch thread");
                self.session.terminate();
                let runner = self.tasks.lock().take();
                if let Some(mut runner) = runner {
                    runner.stop();
                }
                self.status.set(SessionStatus::Stopped, Some(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Queue a named unit of background work. Re-submitting a name replaces it.
    ///
    /// # Errors
    /// `NikError::NotRunning` before `start()` or after teardown.
    pub fn submit_task<F>(&self, name: impl Into<String>, unit: F) -> Result<()>
    where
        F: FnOnce() -> anyhow::Result<String> + Send + 'static,
    {
        match self.tasks.lock().as_ref() {
            Some(runner) => {
                runner.submit(name, unit);
                Ok(())
            }
            None => Err(NikError::NotRunning),
        }
    }

    pub fn task_status(&self, name: &str) -> Option<TaskState> {
        self.tasks.lock().as_ref().and_then(|runner| runner.status(name))
    }

    /// Interrupt the session (e.g. Ctrl-C). The dispatch loop winds down
    /// within one poll interval.
    ///
    /// # Errors
    /// `NikError::NotRunning` if the session already ended.
    pub fn stop(&self, reason: &str) -> Result<()> {
        if !self.session.terminate() {
            return Err(NikError::NotRunning);
        }
        info!(reason, "engine stop requested");
        self.status.set(SessionStatus::Stopping, Some(reason.to_string()));
        Ok(())
    }

    /// Block until the dispatch thread has exited. No-op if never started.
    pub fn join(&self) {
        let handle = self.dispatch.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("dispatch thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.is_running()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.get()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<SessionStatusEvent> {
        self.status.tx.subscribe()
    }

    pub fn diagnostics_snapshot(&self) -> DispatchSnapshot {
        self.diagnostics.snapshot()
    }
}

impl Drop for AssistantEngine {
    fn drop(&mut self) {
        self.session.terminate();
        self.join();
        let runner = self.tasks.lock().take();
        if let Some(mut runner) = runner {
            runner.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utterance::{Reply, Utterance};
    use std::sync::mpsc;

    struct Script(Vec<Utterance>);

    impl InputInterface for Script {
        fn get_input(&mut self) -> Utterance {
            if self.0.is_empty() {
                Utterance::exit_sentinel()
            } else {
                self.0.remove(0)
            }
        }
    }

    struct Collect(mpsc::Sender<String>);

    impl OutputInterface for Collect {
        fn output(&mut self, reply: &Reply) {
            let _ = self.0.send(reply.text.clone());
        }
    }

    #[test]
    fn config_defaults() {
        let c = EngineConfig::default();
        assert_eq!(c.input_poll_interval, Duration::from_millis(200));
        assert_eq!(c.task_tick, Duration::from_millis(100));
        assert_eq!(c.speak_delay, Duration::from_millis(500));
        assert_eq!(c.capture_config(), CaptureConfig::default());
        assert_eq!(c.phrase_config(), PhraseConfig::default());
        assert_eq!(c.voice().name, "default");
    }

    #[test]
    fn start_up_voice_comes_from_config() {
        let mut c = EngineConfig {
            voice_profile: "british".into(),
            ..EngineConfig::default()
        };
        assert_eq!(c.voice().language, "en-uk");
        c.voice_profile = "pirate".into();
        assert_eq!(c.voice(), VoiceProfile::default());
    }

    #[test]
    fn start_twice_is_rejected() {
        let engine = AssistantEngine::new(EngineConfig::default(), DispatchTable::new());
        let (tx, _rx) = mpsc::channel();
        let (_sender, receiver) = engine.input_channel();
        engine.start(receiver, Collect(tx.clone())).expect("first start");
        assert!(matches!(
            engine.start(Script(vec![]), Collect(tx)),
            Err(NikError::AlreadyRunning)
        ));
        engine.stop("test").expect("stop");
        engine.join();
        assert_eq!(engine.status(), SessionStatus::Stopped);
    }

    #[test]
    fn ended_session_cannot_start_or_stop() {
        let engine = AssistantEngine::new(EngineConfig::default(), DispatchTable::new());
        engine.stop("before start").expect("first stop");
        assert!(matches!(engine.stop("again"), Err(NikError::NotRunning)));
        let (tx, _rx) = mpsc::channel();
        assert!(matches!(
            engine.start(Script(vec![]), Collect(tx)),
            Err(NikError::NotRunning)
        ));
        assert!(matches!(
            engine.submit_task("x", || Ok(String::new())),
            Err(NikError::NotRunning)
        ));
    }

    #[test]
    fn exit_phrase_ends_the_session() {
        let engine = AssistantEngine::new(EngineConfig::default(), DispatchTable::new());
        let mut status = engine.subscribe_status();
        let (tx, rx) = mpsc::channel();
        engine
            .start(Script(vec![Utterance::text("anything"), Utterance::text(" Bye ")]), Collect(tx))
            .expect("start");
        engine.join();

        let replies: Vec<String> = rx.try_iter().collect();
        assert_eq!(
            replies,
            vec![
                WELCOME_REPLY.to_string(),
                crate::dispatch::FALLBACK_REPLY.to_string(),
                FAREWELL_REPLY.to_string(),
            ]
        );
        assert!(!engine.is_running());

        let mut seen = Vec::new();
        while let Ok(event) = status.try_recv() {
            seen.push(event.status);
        }
        assert_eq!(
            seen,
            vec![SessionStatus::Running, SessionStatus::Stopping, SessionStatus::Stopped]
        );
        let snap = engine.diagnostics_snapshot();
        assert_eq!(snap.utterances_in, 2);
        assert_eq!(snap.fallbacks, 1);
        assert_eq!(snap.exits, 1);
    }
}

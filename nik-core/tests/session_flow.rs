//! End-to-end session tests: engine + input channel + output sink + voice
//! capture, with fake audio and speech backends.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use nik_core::audio::{AudioClip, AudioSource, ListenWindow};
use nik_core::ipc::{ui_channel, UiReceiver};
use nik_core::responder::greeting::GREETING_CANDIDATES;
use nik_core::responder::identity::SELF_DESCRIPTION_REPLY;
use nik_core::responder::FixedClock;
use nik_core::voice::capture::{Recognizer, VoiceCapture};
use nik_core::voice::playback::AudioPlayer;
use nik_core::voice::synth::{artifact_path, SpeechArtifact, SpeechSynthesizer};
use nik_core::{
    AssistantEngine, DispatchTable, EngineConfig, NikError, OutputSink, Result, SessionStatus,
    Speaker, SpeechOutput, UiUpdate, Utterance, VoiceProfile, FALLBACK_REPLY, FAREWELL_REPLY,
    WELCOME_REPLY,
};

fn fast_config() -> EngineConfig {
    EngineConfig {
        input_poll_interval: Duration::from_millis(20),
        task_tick: Duration::from_millis(10),
        listen_timeout: Duration::from_millis(50),
        phrase_time_limit: Duration::from_millis(50),
        error_backoff: Duration::from_millis(20),
        speak_delay: Duration::ZERO,
        ..EngineConfig::default()
    }
}

fn table() -> DispatchTable {
    let afternoon = NaiveDate::from_ymd_opt(2024, 3, 15)
        .and_then(|d| d.and_hms_opt(15, 7, 0))
        .expect("valid timestamp");
    DispatchTable::with_default_responders(Arc::new(FixedClock(afternoon)))
}

fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

fn assistant_lines(ui: &UiReceiver) -> Vec<String> {
    ui.try_iter()
        .filter_map(|u| match u {
            UiUpdate::Message {
                speaker: Speaker::Assistant,
                text,
            } => Some(text),
            _ => None,
        })
        .collect()
}

/// Plays back scripted phrases, then idles until cancelled.
struct FakeMicrophone {
    phrases: VecDeque<AudioClip>,
}

impl AudioSource for FakeMicrophone {
    fn listen(&mut self, window: ListenWindow, keep_going: &dyn Fn() -> bool) -> Result<Option<AudioClip>> {
        if let Some(clip) = self.phrases.pop_front() {
            return Ok(Some(clip));
        }
        let start = Instant::now();
        while keep_going() && start.elapsed() < window.timeout {
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(None)
    }
}

/// "Recognizes" a clip by its sample count, via a lookup table.
struct FakeRecognizer {
    words: Vec<(usize, &'static str)>,
}

impl Recognizer for FakeRecognizer {
    fn recognize(&mut self, clip: &AudioClip) -> Result<String> {
        self.words
            .iter()
            .find(|(len, _)| *len == clip.samples.len())
            .map(|(_, text)| text.to_string())
            .ok_or(NikError::Unintelligible)
    }
}

struct FileSynth {
    dir: PathBuf,
}

impl SpeechSynthesizer for FileSynth {
    fn synthesize(&self, _text: &str, _profile: &VoiceProfile) -> Result<SpeechArtifact> {
        let path = artifact_path(&self.dir);
        std::fs::write(&path, b"wav")?;
        Ok(SpeechArtifact::new(path))
    }
}

#[derive(Default)]
struct CountingPlayer {
    played: AtomicUsize,
}

impl AudioPlayer for CountingPlayer {
    fn play(&self, _artifact: &SpeechArtifact, _volume: f32) -> Result<()> {
        std::thread::sleep(Duration::from_millis(10));
        self.played.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn typed_scenarios_resolve_in_order() {
    let engine = AssistantEngine::new(fast_config(), table());
    let (ui_tx, ui_rx) = ui_channel();
    let sink = OutputSink::new(ui_tx, None);
    let (input, receiver) = engine.input_channel();
    engine.start(receiver, sink.clone()).expect("start");

    for text in ["hello", "what time is it", "who are you", "asdkjasd", "bye"] {
        input.push(Utterance::text(text));
    }
    engine.join();

    let lines = assistant_lines(&ui_rx);
    assert_eq!(lines.len(), 6, "{lines:?}");
    assert_eq!(lines[0], WELCOME_REPLY);
    assert!(GREETING_CANDIDATES.contains(&lines[1].as_str()), "greeting: {}", lines[1]);
    assert_eq!(lines[2], "The current time is 03:07 PM.");
    assert_eq!(lines[3], SELF_DESCRIPTION_REPLY);
    assert_eq!(lines[4], FALLBACK_REPLY);
    assert_eq!(lines[5], FAREWELL_REPLY);

    assert!(!engine.is_running());
    assert!(sink.teardown_armed());
    assert_eq!(engine.status(), SessionStatus::Stopped);
}

#[test]
fn exit_stops_every_loop_within_a_second() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = AssistantEngine::new(fast_config(), table());
    let (ui_tx, ui_rx) = ui_channel();
    let player = Arc::new(CountingPlayer::default());
    let speech = SpeechOutput::new(
        Arc::new(FileSynth {
            dir: dir.path().to_path_buf(),
        }),
        player.clone(),
    )
    .with_speak_delay(Duration::ZERO);
    let sink = OutputSink::new(ui_tx.clone(), Some(speech));
    let (input, receiver) = engine.input_channel();

    let mut capture = VoiceCapture::spawn(
        engine.config().capture_config(),
        engine.session(),
        input.clone(),
        ui_tx,
        Box::new(|| {
            Ok(Box::new(FakeMicrophone {
                phrases: VecDeque::new(),
            }) as Box<dyn AudioSource>)
        }),
        Box::new(FakeRecognizer { words: vec![] }),
        true,
    )
    .expect("spawn capture");

    engine.start(receiver, sink.clone()).expect("start");
    engine
        .submit_task("warmup", || Ok("ready".to_string()))
        .expect("submit");
    assert!(wait_until(Duration::from_secs(2), || {
        matches!(engine.task_status("warmup"), Some(nik_core::TaskState::Completed(ref s)) if s == "ready")
    }));

    let start = Instant::now();
    input.push(Utterance::text("Bye"));
    engine.join();
    capture.join();
    assert!(start.elapsed() < Duration::from_secs(1), "{:?}", start.elapsed());

    assert!(!engine.session().is_running());
    assert!(!capture.is_alive());
    assert!(sink.teardown_armed());
    // Task runner is released with the session.
    assert!(engine.task_status("warmup").is_none());
    assert!(matches!(
        engine.submit_task("late", || Ok(String::new())),
        Err(NikError::NotRunning)
    ));

    let lines = assistant_lines(&ui_rx);
    assert_eq!(lines.last().map(String::as_str), Some(FAREWELL_REPLY));
    // Speech workers are fire-and-forget, but the host can wait them out.
    assert!(sink.wait_idle(Duration::from_secs(2)));
    assert_eq!(player.played.load(Ordering::SeqCst), 2);
    let left = std::fs::read_dir(dir.path()).expect("read dir").count();
    assert_eq!(left, 0);
}

#[test]
fn voice_and_text_share_one_fifo() {
    let engine = AssistantEngine::new(fast_config(), table());
    let (ui_tx, ui_rx) = ui_channel();
    let sink = OutputSink::new(ui_tx.clone(), None);
    let (input, receiver) = engine.input_channel();

    // 100 samples → "What Time Is It", 200 → unintelligible, 300 → "Goodbye".
    let phrases: VecDeque<AudioClip> = [100, 200, 300]
        .into_iter()
        .map(|n| AudioClip::new(vec![0.3; n], 16_000))
        .collect();
    let mut capture = VoiceCapture::spawn(
        engine.config().capture_config(),
        engine.session(),
        input.clone(),
        ui_tx,
        Box::new(move || Ok(Box::new(FakeMicrophone { phrases }) as Box<dyn AudioSource>)),
        Box::new(FakeRecognizer {
            words: vec![(100, "What Time Is It"), (300, "Goodbye")],
        }),
        true,
    )
    .expect("spawn capture");

    engine.start(receiver, sink).expect("start");
    engine.join();
    capture.join();

    let updates: Vec<UiUpdate> = ui_rx.try_iter().collect();
    let transcript: Vec<(Speaker, String)> = updates
        .iter()
        .filter_map(|u| match u {
            UiUpdate::Message { speaker, text } => Some((*speaker, text.clone())),
            _ => None,
        })
        .collect();
    let pos = |speaker: Speaker, text: &str| {
        transcript
            .iter()
            .position(|(s, t)| *s == speaker && t == text)
            .unwrap_or_else(|| panic!("missing {text:?} in {transcript:?}"))
    };

    let asked = pos(Speaker::User, "What Time Is It");
    let answered = pos(Speaker::Assistant, "The current time is 03:07 PM.");
    let farewell = pos(Speaker::Assistant, FAREWELL_REPLY);
    assert!(asked < answered && answered < farewell);
    assert!(updates
        .iter()
        .any(|u| matches!(u, UiUpdate::Status { text, .. } if text == "Voice Input Active - Could not understand")));
    assert_eq!(capture.diagnostics().recognized, 2);
    assert!(!engine.is_running());
}

#[test]
fn interrupt_ends_a_quiet_session() {
    let engine = AssistantEngine::new(fast_config(), table());
    let (ui_tx, _ui_rx) = ui_channel();
    let (_input, receiver) = engine.input_channel();
    engine.start(receiver, OutputSink::new(ui_tx, None)).expect("start");

    let start = Instant::now();
    engine.stop("interrupt").expect("stop");
    engine.join();
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(engine.status(), SessionStatus::Stopped);
    assert!(matches!(engine.stop("again"), Err(NikError::NotRunning)));
}

//! Terminal front end.
//!
//! The UI thread (the process main thread) is the only writer to stdout. It
//! drains the gui-update queue every 100 ms and applies typed commands read by
//! a separate stdin thread. It never blocks on audio, recognition or dispatch.

use std::io::{BufRead, Write};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use nik_core::ipc::UiReceiver;
use nik_core::voice::capture::VoiceCapture;
use nik_core::{
    InputSender, OutputSink, SessionState, SessionStatus, SessionStatusEvent, Speaker, StatusTone,
    UiUpdate, Utterance, VoiceProfile,
};
use tokio::sync::broadcast;
use tracing::{debug, info};

const REFRESH: Duration = Duration::from_millis(100);
/// How long the window stays after the farewell.
const FAREWELL_GRACE: Duration = Duration::from_secs(1);
/// How long to keep draining after an interrupt.
const INTERRUPT_GRACE: Duration = Duration::from_millis(300);

pub const HELP: &str = "Commands: /mic (toggle voice input), /voice <name> (change voice), /voices, /help. Say or type \"bye\" to quit.";

/// A line typed by the user, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    Submit(String),
    ToggleMic,
    SelectVoice(String),
    ListVoices,
    Help,
}

impl UiCommand {
    /// `None` for blank lines.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Some(Self::Submit(line.to_string()));
        };
        let (name, arg) = command
            .split_once(char::is_whitespace)
            .map(|(n, a)| (n, a.trim()))
            .unwrap_or((command, ""));
        Some(match (name.to_lowercase().as_str(), arg) {
            ("mic", _) => Self::ToggleMic,
            ("voice", "") | ("voices", _) => Self::ListVoices,
            ("voice", name) => Self::SelectVoice(name.to_string()),
            ("help", _) => Self::Help,
            _ => Self::Submit(line.to_string()),
        })
    }
}

/// Format one gui-update as a terminal line.
pub fn render(update: &UiUpdate, now: DateTime<Local>) -> String {
    match update {
        UiUpdate::Message { speaker, text } => {
            format!("[{}] {}: {}", now.format("%H:%M"), speaker.label(), text)
        }
        UiUpdate::Status { text, tone } => {
            let marker = match tone {
                StatusTone::Active => "●",
                StatusTone::Busy => "◐",
                StatusTone::Alert => "○",
            };
            format!("  {marker} {text}")
        }
        UiUpdate::VoiceInput { active } => {
            format!("  [voice input {}]", if *active { "on" } else { "off" })
        }
    }
}

/// Read stdin lines on a detached thread. The thread ends at EOF; it is
/// never joined because a blocked `read_line` cannot be interrupted.
pub fn spawn_stdin_reader<R>(reader: R) -> std::io::Result<Receiver<UiCommand>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = unbounded();
    std::thread::Builder::new()
        .name("nik-stdin".into())
        .spawn(move || read_commands(reader, &tx))?;
    Ok(rx)
}

fn read_commands<R: BufRead>(reader: R, tx: &Sender<UiCommand>) {
    for line in reader.lines() {
        let Ok(line) = line else { break };
        if let Some(command) = UiCommand::parse(&line) {
            if tx.send(command).is_err() {
                break;
            }
        }
    }
    debug!("stdin closed");
}

/// Everything the UI thread drives.
pub struct TerminalUi<W: Write> {
    pub out: W,
    pub updates: UiReceiver,
    pub commands: Receiver<UiCommand>,
    pub status: broadcast::Receiver<SessionStatusEvent>,
    pub input: InputSender,
    pub sink: OutputSink,
    pub session: SessionState,
    pub capture: Option<VoiceCapture>,
}

impl<W: Write> TerminalUi<W> {
    /// Run until the session has ended and the grace period has passed.
    ///
    /// Returns the voice profile name if the user changed it.
    pub fn run(&mut self) -> std::io::Result<Option<String>> {
        let mut ended_at: Option<Instant> = None;
        let mut stdin_open = true;
        let mut voice_changed = None;

        loop {
            match self.updates.recv_timeout(REFRESH) {
                Ok(update) => {
                    self.show(&update)?;
                    while let Ok(update) = self.updates.try_recv() {
                        self.show(&update)?;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {}
            }

            while let Ok(event) = self.status.try_recv() {
                debug!(status = ?event.status, detail = ?event.detail, "session status");
                if event.status == SessionStatus::Stopping && !self.sink.teardown_armed() {
                    writeln!(self.out, "  ○ Shutting down...")?;
                }
            }

            if stdin_open && self.session.is_running() {
                loop {
                    match self.commands.try_recv() {
                        Ok(command) => {
                            if let Some(name) = self.apply(command)? {
                                voice_changed = Some(name);
                            }
                        }
                        Err(crossbeam_channel::TryRecvError::Empty) => break,
                        Err(crossbeam_channel::TryRecvError::Disconnected) => {
                            // EOF on stdin ends the session like an exit phrase.
                            stdin_open = false;
                            self.input.push(Utterance::text("exit"));
                            break;
                        }
                    }
                }
            }

            if !self.session.is_running() {
                let since = *ended_at.get_or_insert_with(Instant::now);
                let grace = if self.sink.teardown_armed() {
                    FAREWELL_GRACE
                } else {
                    INTERRUPT_GRACE
                };
                if since.elapsed() >= grace {
                    break;
                }
            }
        }

        while let Ok(update) = self.updates.try_recv() {
            self.show(&update)?;
        }
        self.out.flush()?;
        Ok(voice_changed)
    }

    fn show(&mut self, update: &UiUpdate) -> std::io::Result<()> {
        writeln!(self.out, "{}", render(update, Local::now()))?;
        self.out.flush()
    }

    fn apply(&mut self, command: UiCommand) -> std::io::Result<Option<String>> {
        match command {
            UiCommand::Submit(text) => {
                self.show(&UiUpdate::message(Speaker::User, text.as_str()))?;
                self.input.push(Utterance::text(text.to_lowercase()));
            }
            UiCommand::ToggleMic => match &self.capture {
                Some(capture) => {
                    capture.toggle();
                }
                None => self.show(&UiUpdate::status(
                    "Voice input unavailable in this session",
                    StatusTone::Alert,
                ))?,
            },
            UiCommand::SelectVoice(name) => {
                if self.sink.select_voice(&name) {
                    let profile = self.sink.active_profile();
                    info!(profile = profile.name.as_str(), "voice changed from terminal");
                    self.show(&UiUpdate::status(
                        format!("Voice set to {}", profile.name),
                        StatusTone::Active,
                    ))?;
                    return Ok(Some(profile.name));
                }
                self.show(&UiUpdate::status(
                    format!("Unknown voice '{name}'"),
                    StatusTone::Alert,
                ))?;
            }
            UiCommand::ListVoices => {
                let names: Vec<&str> = VoiceProfile::names().collect();
                self.show(&UiUpdate::status(
                    format!("Voices: {}", names.join(", ")),
                    StatusTone::Active,
                ))?;
            }
            UiCommand::Help => self.show(&UiUpdate::status(HELP, StatusTone::Active))?,
        }
        Ok(None)
    }
}

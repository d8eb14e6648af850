//! `nik`: terminal host for the Nik assistant.
//!
//! The main thread is the UI thread. The dispatch loop, task runner, voice
//! capture and speech workers all run on background threads owned by
//! `nik-core`; this binary only wires them together.

mod backends;
mod settings;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use nik_core::ipc::ui_channel;
use nik_core::voice::capture::VoiceCapture;
use nik_core::voice::synth::{sweep_stale_artifacts, STALE_AFTER};
use nik_core::{AssistantEngine, DispatchTable, OutputSink, SystemClock};
use tracing::{info, warn};

use crate::settings::{data_dir, default_settings_path, load_settings, save_settings};
use crate::ui::{spawn_stdin_reader, TerminalUi, HELP};

/// Upper bound on how long exit waits for replies still being spoken.
const SPEECH_DRAIN: Duration = Duration::from_secs(15);

#[derive(Parser, Debug)]
#[command(name = "nik", version, about = "Nik desktop assistant")]
struct Cli {
    /// Start with voice input off (toggle with /mic).
    #[arg(long)]
    text_only: bool,

    /// Do not speak replies.
    #[arg(long)]
    mute: bool,

    /// Voice profile (default, calm, excited, british, robot, slow).
    #[arg(long, value_name = "PROFILE")]
    voice: Option<String>,

    /// Settings file [default: <data dir>/settings.json].
    #[arg(long, value_name = "PATH", env = "NIK_SETTINGS")]
    settings: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("nik=info,nik_core=info")),
        )
        .init();

    let cli = Cli::parse();

    // ── Settings ──────────────────────────────────────────────────────────
    let settings_path = cli.settings.clone().unwrap_or_else(default_settings_path);
    let mut app_settings = load_settings(&settings_path);
    if let Some(voice) = &cli.voice {
        app_settings.voice_profile = settings::normalize_voice_profile(voice);
    }
    if cli.text_only {
        app_settings.voice_input_enabled = false;
    }
    if cli.mute {
        app_settings.speech_output_enabled = false;
    }
    info!(
        settings_path = ?settings_path,
        voice_profile = %app_settings.voice_profile,
        voice_input = app_settings.voice_input_enabled,
        speech_output = app_settings.speech_output_enabled,
        "settings loaded"
    );

    // ── Engine setup ──────────────────────────────────────────────────────
    let config = app_settings.engine_config();
    let engine = Arc::new(AssistantEngine::new(
        config.clone(),
        DispatchTable::with_default_responders(Arc::new(SystemClock)),
    ));

    let artifact_dir = data_dir().join("speech");
    let artifact_dir = match std::fs::create_dir_all(&artifact_dir) {
        Ok(()) => artifact_dir,
        Err(e) => {
            warn!(error = %e, dir = %artifact_dir.display(), "speech directory unavailable, using temp dir");
            std::env::temp_dir()
        }
    };

    let (ui_tx, ui_rx) = ui_channel();
    let speech = backends::speech_output(&app_settings, &artifact_dir, &config);
    let sink = OutputSink::new(ui_tx.clone(), speech).with_profile(app_settings.voice());
    let (input, receiver) = engine.input_channel();

    // ── Voice capture ─────────────────────────────────────────────────────
    let capture = match backends::recognizer(&app_settings) {
        Some(recognizer) => Some(
            VoiceCapture::spawn(
                config.capture_config(),
                engine.session(),
                input.clone(),
                ui_tx,
                backends::source_factory(&app_settings, &config),
                recognizer,
                app_settings.voice_input_enabled,
            )
            .context("starting voice capture")?,
        ),
        None => {
            drop(ui_tx);
            None
        }
    };

    let status = engine.subscribe_status();
    engine
        .start(receiver, sink.clone())
        .context("starting dispatch loop")?;

    let sweep_dir = artifact_dir.clone();
    engine.submit_task("sweep-artifacts", move || {
        let removed = sweep_stale_artifacts(&sweep_dir, STALE_AFTER)?;
        Ok(format!("removed {removed} stale speech file(s)"))
    })?;

    // ── Interrupt ─────────────────────────────────────────────────────────
    {
        let engine = engine.clone();
        std::thread::Builder::new()
            .name("nik-signal".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        warn!(error = %e, "interrupt handler unavailable");
                        return;
                    }
                };
                runtime.block_on(async {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("received Ctrl+C, shutting down...");
                        let _ = engine.stop("interrupt");
                    }
                });
            })
            .context("starting interrupt watcher")?;
    }

    // ── UI loop ───────────────────────────────────────────────────────────
    println!("Nik v{}", env!("CARGO_PKG_VERSION"));
    println!("{HELP}\n");

    let commands = spawn_stdin_reader(std::io::BufReader::new(std::io::stdin())).context("starting stdin reader")?;
    let mut terminal = TerminalUi {
        out: std::io::stdout(),
        updates: ui_rx,
        commands,
        status,
        input,
        sink,
        session: engine.session(),
        capture,
    };
    let voice_changed = terminal.run().context("terminal output")?;

    engine.join();
    if let Some(capture) = terminal.capture.as_mut() {
        capture.join();
    }

    // Let the farewell finish speaking, then remove whatever a stuck worker left.
    if !terminal.sink.wait_idle(SPEECH_DRAIN) {
        warn!(remaining = terminal.sink.in_flight(), "speech still playing at exit");
    }
    match sweep_stale_artifacts(&artifact_dir, Duration::ZERO) {
        Ok(0) => {}
        Ok(removed) => info!(removed, "removed leftover speech files"),
        Err(e) => warn!(error = %e, "speech file cleanup failed"),
    }

    // Only the voice choice persists; command-line overrides do not.
    if let Some(name) = voice_changed {
        let mut stored = load_settings(&settings_path);
        stored.voice_profile = name;
        if let Err(e) = save_settings(&settings_path, &stored) {
            warn!(error = %e, "failed to save settings");
        }
    }

    let summary = engine.diagnostics_snapshot();
    info!(
        utterances = summary.utterances_in,
        replies = summary.replies_out,
        fallbacks = summary.fallbacks,
        "session ended"
    );
    Ok(())
}

//! Blocking dispatch loop.
//!
//! ## Per iteration
//!
//! ```text
//! 1. get_input()            blocks; sentinel "exit" once the session ends
//! 2. exit phrase?           farewell → terminate session → break
//! 3. DispatchTable::resolve first capable responder, else fallback
//! 4. output(reply)          visual now, speech on its own worker
//! ```
//!
//! After the loop the task runner is stopped and the status becomes
//! `Stopped`. Nothing an input or output implementation does can end the
//! loop except producing an exit phrase.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use tracing::{debug, info};

use super::{SharedTasks, StatusReporter, FAREWELL_REPLY, WELCOME_REPLY};
use crate::{
    dispatch::{is_exit_phrase, DispatchTable},
    interface::{InputInterface, OutputInterface},
    ipc::events::SessionStatus,
    session::SessionState,
    utterance::Reply,
};

#[derive(Default)]
pub struct DispatchDiagnostics {
    pub utterances_in: AtomicUsize,
    pub replies_out: AtomicUsize,
    pub fallbacks: AtomicUsize,
    pub exits: AtomicUsize,
}

impl DispatchDiagnostics {
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            utterances_in: self.utterances_in.load(Ordering::Relaxed),
            replies_out: self.replies_out.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            exits: self.exits.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub utterances_in: usize,
    pub replies_out: usize,
    pub fallbacks: usize,
    pub exits: usize,
}

/// Everything the loop needs, moved onto the dispatch thread in one piece.
pub(crate) struct DispatchContext {
    pub table: Arc<DispatchTable>,
    pub session: SessionState,
    pub input: Box<dyn InputInterface>,
    pub output: Box<dyn OutputInterface>,
    pub status: Arc<StatusReporter>,
    pub tasks: SharedTasks,
    pub diagnostics: Arc<DispatchDiagnostics>,
}

impl DispatchContext {
    fn reply(&mut self, reply: Reply) {
        self.diagnostics.replies_out.fetch_add(1, Ordering::Relaxed);
        self.output.output(&reply);
    }
}

pub(crate) fn run(mut ctx: DispatchContext) {
    info!("dispatch loop started");
    ctx.reply(Reply::new(WELCOME_REPLY));

    loop {
        let utterance = ctx.input.get_input();
        let text = utterance.as_str();

        if is_exit_phrase(text) {
            if !utterance.is_sentinel() {
                ctx.diagnostics.utterances_in.fetch_add(1, Ordering::Relaxed);
            }
            ctx.diagnostics.exits.fetch_add(1, Ordering::Relaxed);
            info!(source = ?utterance.source(), "exit phrase received");
            ctx.reply(Reply::new(FAREWELL_REPLY));
            if ctx.session.terminate() {
                ctx.status.set(SessionStatus::Stopping, Some("exit phrase".into()));
            }
            break;
        }

        ctx.diagnostics.utterances_in.fetch_add(1, Ordering::Relaxed);
        debug!(source = ?utterance.source(), text, "utterance received");
        let (matched, reply) = ctx.table.route(text);
        if matched.is_none() {
            ctx.diagnostics.fallbacks.fetch_add(1, Ordering::Relaxed);
        }
        ctx.reply(reply);
    }

    let runner = ctx.tasks.lock().take();
    if let Some(mut runner) = runner {
        runner.stop();
    }
    ctx.status.set(SessionStatus::Stopped, None);
    info!("dispatch loop exited");
}

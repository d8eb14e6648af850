//! Input channel: many producers (voice capture, UI submit) → one consumer
//! (the dispatch loop), FIFO.
//!
//! `push` never blocks. `pop` blocks on `recv_timeout` in poll-interval slices
//! so it notices the session ending within one interval and hands back the
//! sentinel exit utterance.

use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace};

use crate::interface::InputInterface;
use crate::session::SessionState;
use crate::utterance::Utterance;

/// Default slice `pop` waits before re-checking the session flag.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Producer half. Clone one per producer thread.
#[derive(Debug, Clone)]
pub struct InputSender {
    tx: Sender<Utterance>,
}

impl InputSender {
    /// Queue an utterance. Never blocks; if the dispatch loop is already gone
    /// the utterance is dropped.
    pub fn push(&self, utterance: Utterance) {
        if self.tx.send(utterance).is_err() {
            trace!("input channel closed, utterance dropped");
        }
    }
}

/// Consumer half, owned by the dispatch loop.
#[derive(Debug)]
pub struct InputReceiver {
    rx: Receiver<Utterance>,
    session: SessionState,
    poll_interval: Duration,
}

impl InputReceiver {
    /// Block until an utterance is available or the session ends.
    ///
    /// Returns [`Utterance::exit_sentinel`] once the session flag is `false`
    /// or every producer has been dropped.
    pub fn pop(&self) -> Utterance {
        loop {
            if !self.session.is_running() {
                return Utterance::exit_sentinel();
            }
            match self.rx.recv_timeout(self.poll_interval) {
                Ok(utterance) => return utterance,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("all input producers dropped");
                    return Utterance::exit_sentinel();
                }
            }
        }
    }

    /// Utterances waiting to be dequeued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl InputInterface for InputReceiver {
    fn get_input(&mut self) -> Utterance {
        self.pop()
    }
}

/// Create a connected sender/receiver pair bound to `session`.
pub fn input_channel(session: SessionState, poll_interval: Duration) -> (InputSender, InputReceiver) {
    let (tx, rx) = unbounded();
    (
        InputSender { tx },
        InputReceiver {
            rx,
            session,
            poll_interval,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    const POLL: Duration = Duration::from_millis(20);

    #[test]
    fn preserves_fifo_across_producers() {
        let (tx, rx) = input_channel(SessionState::new(), POLL);
        let voice = tx.clone();
        voice.push(Utterance::voice("one"));
        tx.push(Utterance::text("two"));
        voice.push(Utterance::voice("three"));

        assert_eq!(rx.len(), 3);
        let popped: Vec<_> = (0..3).map(|_| rx.pop()).collect();
        assert_eq!(popped[0], Utterance::voice("one"));
        assert_eq!(popped[1], Utterance::text("two"));
        assert_eq!(popped[2], Utterance::voice("three"));
        assert!(rx.is_empty());
    }

    #[test]
    fn pop_wakes_with_sentinel_when_session_ends() {
        let session = SessionState::new();
        let (_tx, rx) = input_channel(session.clone(), POLL);
        let handle = std::thread::spawn(move || {
            let start = Instant::now();
            (rx.pop(), start.elapsed())
        });
        std::thread::sleep(Duration::from_millis(50));
        session.terminate();

        let (utterance, waited) = handle.join().expect("consumer panicked");
        assert!(utterance.is_sentinel());
        assert!(waited < Duration::from_secs(1));
    }

    #[test]
    fn pop_returns_sentinel_when_producers_are_gone() {
        let (tx, rx) = input_channel(SessionState::new(), POLL);
        tx.push(Utterance::text("last words"));
        drop(tx);
        assert_eq!(rx.pop().as_str(), "last words");
        assert!(rx.pop().is_sentinel());
    }

    #[test]
    fn push_after_consumer_dropped_is_silent() {
        let (tx, rx) = input_channel(SessionState::new(), POLL);
        drop(rx);
        tx.push(Utterance::text("nobody listens"));
    }
}

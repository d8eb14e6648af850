//! The two capabilities the dispatch loop depends on.
//!
//! Any front end (console, windowed UI, pure voice) plugs in by implementing
//! `InputInterface` and `OutputInterface`; the dispatch core never touches
//! anything else.

pub mod console;

pub use console::{ConsoleInput, ConsoleOutput};

use crate::utterance::{Reply, Utterance};

/// Source of utterances for the dispatch loop.
pub trait InputInterface: Send {
    /// Block until the next utterance is available.
    ///
    /// Implementations return [`Utterance::exit_sentinel`] once no further
    /// input can arrive.
    fn get_input(&mut self) -> Utterance;
}

/// Sink for replies.
pub trait OutputInterface: Send {
    /// Deliver a reply. Must not block the dispatch loop on audio or I/O
    /// latency beyond a cheap write.
    fn output(&mut self, reply: &Reply);
}

impl<T: InputInterface + ?Sized> InputInterface for Box<T> {
    fn get_input(&mut self) -> Utterance {
        (**self).get_input()
    }
}

impl<T: OutputInterface + ?Sized> OutputInterface for Box<T> {
    fn output(&mut self, reply: &Reply) {
        (**self).output(reply)
    }
}

//! Types exchanged between the worker threads and the UI thread.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so a front end
//! can forward them verbatim (JSON lines, web view bridge, ...).

pub mod events;

use crossbeam_channel::{unbounded, Receiver, Sender};

use events::UiUpdate;

/// Producer half of the gui-update queue. Cloned into every thread that needs
/// to touch the visual surface.
pub type UiSender = Sender<UiUpdate>;

/// Consumer half of the gui-update queue, drained by the UI thread only.
pub type UiReceiver = Receiver<UiUpdate>;

/// Create the gui-update queue.
pub fn ui_channel() -> (UiSender, UiReceiver) {
    unbounded()
}

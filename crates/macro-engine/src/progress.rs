use crate::macros::{Macro, Slot};
use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// A macro run starting or stopping.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Start {
        mac: Arc<Macro>,
        slot: Option<Slot>,
        total_time: Duration,
    },
    Stop {
        mac: Arc<Macro>,
        slot: Option<Slot>,
    },
}

impl Progress {
    /// The macro this event is about.
    pub fn mac(&self) -> &Arc<Macro> {
        match self {
            Progress::Start { mac, .. } | Progress::Stop { mac, .. } => mac,
        }
    }

    /// The slot the macro was triggered from, if any.
    pub fn slot(&self) -> Option<Slot> {
        match self {
            Progress::Start { slot, .. } | Progress::Stop { slot, .. } => *slot,
        }
    }

    /// The estimated run time; only present on `Start`.
    pub fn total_time(&self) -> Option<Duration> {
        match self {
            Progress::Start { total_time, .. } => Some(*total_time),
            Progress::Stop { .. } => None,
        }
    }

    /// True for `Start`.
    pub fn is_start(&self) -> bool {
        matches!(self, Progress::Start { .. })
    }
}

/// Observer callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

/// Forwards progress to at most one observer, isolating the engine from it.
#[derive(Default)]
pub struct ProgressNotifier {
    observer: RwLock<Option<ProgressCallback>>,
}

impl ProgressNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the observer. `None` removes it.
    pub fn set_observer(&self, observer: Option<ProgressCallback>) {
        *self.observer.write() = observer;
    }

    /// Deliver an event. A panicking observer is caught and ignored.
    pub fn notify(&self, event: &Progress) {
        let observer = self.observer.read().clone();
        let Some(observer) = observer else {
            trace!("progress with no observer");
            return;
        };
        if panic::catch_unwind(AssertUnwindSafe(|| observer(event))).is_err() {
            debug!(slot = ?event.slot(), "progress observer panicked; ignored");
        }
    }
}

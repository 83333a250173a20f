//! Change debouncing for the file watcher.
//!
//! Editors emit several events per save. Events for the same path inside the
//! debounce window collapse into a single change.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Kind of filesystem event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// Change waiting for its window to pass.
struct Pending {
    /// First event in the window was a creation.
    created: bool,
    deadline: Instant,
}

/// Thread-safe per-path debouncer.
pub(crate) struct ChangeDebouncer {
    pending: Mutex<HashMap<String, Pending>>,
    window: Duration,
}

impl ChangeDebouncer {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            window,
        }
    }

    /// Record an event for `path`, pushing its deadline back.
    ///
    /// A path created and removed within one window is forgotten.
    pub(crate) fn record(&self, path: String, kind: ChangeKind) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let deadline = Instant::now() + self.window;

        match pending.entry(path) {
            Entry::Vacant(entry) => {
                entry.insert(Pending {
                    created: kind == ChangeKind::Created,
                    deadline,
                });
            }
            Entry::Occupied(entry) if entry.get().created && kind == ChangeKind::Removed => {
                entry.remove();
            }
            Entry::Occupied(mut entry) => {
                entry.get_mut().deadline = deadline;
            }
        }
    }

    /// Take every path whose window has passed, sorted.
    pub(crate) fn drain_ready(&self) -> Vec<String> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        let mut ready: Vec<String> = pending
            .iter()
            .filter(|(_, change)| change.deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &ready {
            pending.remove(path);
        }

        ready.sort();
        ready
    }
}

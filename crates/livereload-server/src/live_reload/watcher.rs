//! File watcher feeding the hub.
//!
//! Watches a directory, debounces changes per path, and broadcasts a `reload`
//! for every settled change whose root-relative path matches a watch pattern.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::debouncer::{ChangeDebouncer, ChangeKind};
use super::hub::Hub;
use crate::error::ServerError;

/// How often settled changes are collected.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What to watch and how.
#[derive(Clone, Debug)]
pub struct WatchOptions {
    /// Directory watched recursively.
    pub dir: PathBuf,
    /// Glob patterns, relative to `dir`.
    pub patterns: Vec<String>,
    /// Debounce window per path.
    pub debounce: Duration,
}

/// Watches files and tells the hub to reload them.
pub struct FileWatcher {
    options: WatchOptions,
    hub: Arc<Hub>,
    watcher: Option<RecommendedWatcher>,
    tasks: Vec<JoinHandle<()>>,
}

impl FileWatcher {
    #[must_use]
    pub fn new(options: WatchOptions, hub: Arc<Hub>) -> Self {
        Self {
            options,
            hub,
            watcher: None,
            tasks: Vec::new(),
        }
    }

    /// Start watching.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is not a valid glob, the directory cannot
    /// be resolved, or the OS watcher cannot be created.
    pub fn start(&mut self) -> Result<(), ServerError> {
        let patterns = self
            .options
            .patterns
            .iter()
            .map(|p| glob::Pattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let root = self
            .options
            .dir
            .canonicalize()
            .map_err(|e| ServerError::Watch(notify::Error::io(e)))?;

        let (tx, mut rx) = mpsc::channel::<Event>(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                // Callback runs on the notify thread
                let _ = tx.blocking_send(event);
            }
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;
        self.watcher = Some(watcher);

        let debouncer = Arc::new(ChangeDebouncer::new(self.options.debounce));

        let recorder = Arc::clone(&debouncer);
        let record_root = root.clone();
        self.tasks.push(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                Self::record_event(&event, &record_root, &patterns, &recorder);
            }
        }));

        let hub = Arc::clone(&self.hub);
        self.tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(POLL_INTERVAL);
            loop {
                interval.tick().await;
                for path in debouncer.drain_ready() {
                    let recipients = hub.reload(&path);
                    tracing::info!(path = %path, recipients, "Reload broadcast");
                }
            }
        }));

        tracing::info!(dir = %root.display(), "Watching for changes");
        Ok(())
    }

    /// Record a raw filesystem event into the debouncer.
    fn record_event(
        event: &Event,
        root: &Path,
        patterns: &[glob::Pattern],
        debouncer: &ChangeDebouncer,
    ) {
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Modify(_) => ChangeKind::Modified,
            EventKind::Remove(_) => ChangeKind::Removed,
            _ => return,
        };

        for path in &event.paths {
            let Some(relative) = Self::relative_path(path, root) else {
                continue;
            };
            if !Self::matches_patterns(&relative, patterns) {
                continue;
            }

            tracing::debug!(path = %relative, ?kind, "Recorded filesystem event");
            debouncer.record(relative, kind);
        }
    }

    /// Root-relative path with `/` separators, or `None` outside `root`.
    fn relative_path(path: &Path, root: &Path) -> Option<String> {
        let relative = path.strip_prefix(root).ok()?;
        let segments: Vec<_> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy()),
                _ => None,
            })
            .collect();

        if segments.is_empty() {
            None
        } else {
            Some(segments.join("/"))
        }
    }

    fn matches_patterns(relative: &str, patterns: &[glob::Pattern]) -> bool {
        patterns.iter().any(|pattern| pattern.matches(relative))
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

//! File watching for watch-enabled sessions.
//!
//! A session tells the watcher which files its last build touched. The
//! watcher subscribes to the nearest existing parent directory of each one
//! (non-recursively) and forwards create/modify/remove events for tracked
//! paths as [`SessionUpdate`]s. Paths below a tracked path also count, so an
//! entry that did not exist yet (`sub` before `sub/index.js` is written) still
//! triggers a rebuild once it appears.

use crate::engine::SessionUpdate;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Tracks the files of one session and reports changes to them.
pub struct SessionWatcher {
    /// Underlying notify watcher
    watcher: RecommendedWatcher,
    /// Directories currently subscribed
    watched_dirs: HashSet<PathBuf>,
    /// Files the last build depended on
    tracked: Arc<RwLock<HashSet<PathBuf>>>,
}

impl SessionWatcher {
    /// Create a watcher that reports on `tx`.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watcher cannot be created.
    pub fn new(tx: mpsc::Sender<SessionUpdate>) -> notify::Result<Self> {
        let tracked: Arc<RwLock<HashSet<PathBuf>>> = Arc::default();
        let tracked_clone = Arc::clone(&tracked);

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };

            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                return;
            }

            let paths: Vec<PathBuf> = {
                let tracked = tracked_clone.read();
                event
                    .paths
                    .into_iter()
                    .filter(|path| Self::is_tracked(path, &tracked))
                    .collect()
            };

            if paths.is_empty() {
                return;
            }

            tracing::debug!(?paths, "watched files changed");

            // A full channel already holds a pending update for this session
            let _ = tx.try_send(SessionUpdate { paths });
        })?;

        Ok(Self {
            watcher,
            watched_dirs: HashSet::new(),
            tracked,
        })
    }

    /// Replace the tracked file set and subscribe to any new directories.
    ///
    /// Directories that fail to subscribe are logged and skipped; the next
    /// build retries them.
    pub fn track(&mut self, files: impl IntoIterator<Item = PathBuf>) {
        let files: HashSet<PathBuf> = files.into_iter().collect();
        for file in &files {
            self.subscribe_parent(file);
        }
        *self.tracked.write() = files;
    }

    /// Add one file to the tracked set, watching its directory right away.
    ///
    /// Files added this way stay tracked until the next [`track`](Self::track).
    pub fn watch_file(&mut self, file: &Path) {
        self.subscribe_parent(file);
        self.tracked.write().insert(file.to_path_buf());
    }

    fn subscribe_parent(&mut self, file: &Path) {
        let Some(dir) = nearest_existing_dir(file) else {
            return;
        };
        if self.watched_dirs.contains(&dir) {
            return;
        }
        match self.watcher.watch(&dir, RecursiveMode::NonRecursive) {
            Ok(()) => {
                tracing::trace!(dir = %dir.display(), "watching directory");
                self.watched_dirs.insert(dir);
            }
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to watch directory");
            }
        }
    }

    /// Whether `file` is in the tracked set.
    pub fn is_watching(&self, file: &Path) -> bool {
        self.tracked.read().contains(file)
    }

    /// Number of directories subscribed.
    pub fn watched_dir_count(&self) -> usize {
        self.watched_dirs.len()
    }

    /// Check whether an event path concerns a tracked file.
    fn is_tracked(path: &Path, tracked: &HashSet<PathBuf>) -> bool {
        tracked.contains(path) || tracked.iter().any(|file| path.starts_with(file))
    }
}

/// Closest ancestor of `path` (excluding `path` itself) that is a directory.
fn nearest_existing_dir(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .skip(1)
        .find(|dir| dir.is_dir())
        .map(Path::to_path_buf)
}

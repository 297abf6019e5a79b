//! Build lifecycle notifications.
//!
//! Observers implement [`BundleObserver`], overriding only the hooks they
//! care about, and register with [`Observers::subscribe`]. The registry lock
//! is released before any hook runs, so hooks may subscribe or unsubscribe
//! other observers.

use crate::engine::BundleSession;
use crate::error::BundleError;
use crate::module_name::ModuleName;
use crate::normalize::BundleOutcome;
use axum::http::HeaderMap;
use parking_lot::RwLock;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Response about to be sent for a matched request.
pub struct ResponseContext<'a> {
    /// Requested module, as captured from the request path
    pub module: &'a str,
    /// Build error, if the bundle failed
    pub error: Option<&'a BundleError>,
    /// Response headers; observers may add or replace entries
    pub headers: &'a mut HeaderMap,
    /// Body about to be sent
    pub source: &'a str,
}

/// Hooks into the bundle lifecycle. Every method defaults to a no-op.
pub trait BundleObserver: Send + Sync {
    /// A session is configured and about to build for the first time.
    fn pre_bundle(&self, _session: &mut dyn BundleSession, _module: &ModuleName, _path: &Path) {}

    /// Files of a watched module changed; a rebuild follows.
    fn source_changed(&self, _module: &ModuleName, _paths: &[PathBuf]) {}

    /// A build (initial or rebuild) finished and was normalized.
    fn new_source(&self, _module: &ModuleName, _outcome: &BundleOutcome) {}

    /// A build failed.
    fn bundle_error(&self, _error: &BundleError) {}

    /// A matched request is about to be answered.
    fn pre_response(&self, _response: &mut ResponseContext<'_>) {}
}

/// Handle returned by [`Observers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registry of observers, notified in subscription order.
#[derive(Default)]
pub struct Observers {
    entries: RwLock<Vec<(SubscriptionId, Arc<dyn BundleObserver>)>>,
    next_id: AtomicU64,
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.len())
            .finish()
    }
}

impl Observers {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    pub fn subscribe(&self, observer: Arc<dyn BundleObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push((id, observer));
        id
    }

    /// Remove an observer. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<dyn BundleObserver>> {
        self.entries
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect()
    }

    pub(crate) fn emit_pre_bundle(
        &self,
        session: &mut dyn BundleSession,
        module: &ModuleName,
        path: &Path,
    ) {
        for observer in self.snapshot() {
            observer.pre_bundle(session, module, path);
        }
    }

    pub(crate) fn emit_source_changed(&self, module: &ModuleName, paths: &[PathBuf]) {
        for observer in self.snapshot() {
            observer.source_changed(module, paths);
        }
    }

    pub(crate) fn emit_new_source(&self, module: &ModuleName, outcome: &BundleOutcome) {
        for observer in self.snapshot() {
            observer.new_source(module, outcome);
        }
    }

    pub(crate) fn emit_bundle_error(&self, error: &BundleError) {
        for observer in self.snapshot() {
            observer.bundle_error(error);
        }
    }

    pub(crate) fn emit_pre_response(&self, response: &mut ResponseContext<'_>) {
        for observer in self.snapshot() {
            observer.pre_response(response);
        }
    }
}

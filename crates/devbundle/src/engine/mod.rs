//! Bundle engine collaborator interface.
//!
//! The orchestrator only talks to these traits. An engine hands out sessions;
//! a session is configured with entries and transforms, then bundled. A
//! watch-enabled session also hands out a channel of [`SessionUpdate`]s, one
//! per detected change, and expects to be bundled again after each.
//!
//! [`CommonJsEngine`] is the built-in implementation.

pub mod commonjs;
mod watcher;

pub use commonjs::{CommonJsEngine, CommonJsOptions};
pub use watcher::SessionWatcher;

use crate::error::BundleError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Options used when creating a session.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Keep watching the files touched by each build
    pub watch: bool,
    /// Engine-specific pass-through options
    pub engine: Value,
}

/// Options passed to every `bundle` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BundleOptions {
    /// Use file paths instead of numbers as module ids
    pub debug: bool,
}

/// Signal that files a watch session depends on have changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUpdate {
    /// Paths reported by the watcher
    pub paths: Vec<PathBuf>,
}

/// Factory for bundle sessions.
pub trait BundleEngine: Send + Sync {
    /// Create a fresh session.
    fn create_session(&self, options: &SessionOptions) -> Box<dyn BundleSession>;
}

/// One build state bound to a set of entries and transforms.
#[async_trait]
pub trait BundleSession: Send {
    /// Add an entry file. Entries execute in the order they were added.
    fn add_entry(&mut self, path: &Path);

    /// Add a transform by id. Unknown ids fail at bundle time.
    fn add_transform(&mut self, id: &str, options: Option<Value>);

    /// Build the bundle. Callable repeatedly on a watch-enabled session.
    async fn bundle(&mut self, options: &BundleOptions) -> Result<String, BundleError>;

    /// Take the change channel of a watch-enabled session.
    ///
    /// Returns `None` for one-shot sessions and on every call after the first.
    fn take_updates(&mut self) -> Option<mpsc::Receiver<SessionUpdate>>;
}

//! The bundle orchestrator.
//!
//! [`Bundler`] decides whether a request is answered from the cache or by a
//! build, runs builds through the configured [`BundleEngine`], and keeps
//! watch sessions alive so cached bundles are refreshed without any request
//! waiting on them.
//!
//! Concurrency rules:
//!
//! - Concurrent builds of the same module share one in-flight future. The
//!   build runs on its own task and completes even if every caller goes away.
//! - A module has at most one watch session. Starting a new one aborts the
//!   previous task; `evict`, `purge_expired`, `shutdown` and dropping the
//!   last handle abort them too.
//! - Watch tasks only hold a weak reference to the orchestrator.

use crate::cache::BundleCache;
use crate::config::BundlerConfig;
use crate::engine::{
    BundleEngine, BundleOptions, BundleSession, CommonJsEngine, SessionOptions, SessionUpdate,
};
use crate::error::{BundleError, ConfigError};
use crate::events::{BundleObserver, Observers, SubscriptionId};
use crate::middleware::{BundleMiddleware, compile_pattern};
use crate::module_name::ModuleName;
use crate::normalize::{BundleOutcome, normalize};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Adds the entry files of a module to a fresh session.
///
/// The default, [`RootEntry`], adds the resolved module path as sole entry.
/// Closures with the same signature implement this trait.
pub trait EntryStrategy: Send + Sync {
    /// Configure `session` for `module`, whose resolved path is `path`.
    fn add_entries(&self, session: &mut dyn BundleSession, module: &ModuleName, path: &Path);
}

impl<F> EntryStrategy for F
where
    F: Fn(&mut dyn BundleSession, &ModuleName, &Path) + Send + Sync,
{
    fn add_entries(&self, session: &mut dyn BundleSession, module: &ModuleName, path: &Path) {
        self(session, module, path)
    }
}

/// Adds `root/<module>` as the only entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct RootEntry;

impl EntryStrategy for RootEntry {
    fn add_entries(&self, session: &mut dyn BundleSession, _module: &ModuleName, path: &Path) {
        session.add_entry(path);
    }
}

/// Builder for [`Bundler`].
pub struct BundlerBuilder {
    config: BundlerConfig,
    engine: Option<Arc<dyn BundleEngine>>,
    entry: Arc<dyn EntryStrategy>,
}

impl BundlerBuilder {
    /// Start from a configuration.
    pub fn new(config: BundlerConfig) -> Self {
        Self {
            config,
            engine: None,
            entry: Arc::new(RootEntry),
        }
    }

    /// Use a custom engine instead of [`CommonJsEngine`].
    pub fn engine(mut self, engine: Arc<dyn BundleEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Replace the entry strategy.
    pub fn add_file(mut self, strategy: impl EntryStrategy + 'static) -> Self {
        self.entry = Arc::new(strategy);
        self
    }

    /// Validate the configuration and create the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the root is missing, a value is out of
    /// range, or the request pattern is invalid.
    pub fn build(self) -> Result<Bundler, ConfigError> {
        let root = absolute_root(self.config.validate()?);
        let pattern = compile_pattern(self.config.pattern())?;

        let cache = Arc::new(BundleCache::new(self.config.watch, self.config.cache_ttl()));
        let observers = Observers::new();
        observers.subscribe(cache.clone());

        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(CommonJsEngine::default()));

        tracing::debug!(
            root = %root.display(),
            watch = self.config.watch,
            transforms = self.config.transforms.len(),
            "bundler ready"
        );

        Ok(Bundler {
            inner: Arc::new(Inner {
                config: self.config,
                root,
                pattern,
                engine,
                entry: self.entry,
                cache,
                observers,
                in_flight: Mutex::new(HashMap::new()),
                sessions: Mutex::new(HashMap::new()),
            }),
        })
    }
}

fn absolute_root(root: &Path) -> PathBuf {
    let absolute = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
    absolute.canonicalize().unwrap_or(absolute)
}

type SharedBuild = Shared<BoxFuture<'static, BundleOutcome>>;

/// Serves bundles by module name, from cache or by building them.
///
/// Cloning is cheap; clones share the same cache and sessions.
#[derive(Clone)]
pub struct Bundler {
    inner: Arc<Inner>,
}

struct Inner {
    config: BundlerConfig,
    root: PathBuf,
    pattern: Regex,
    engine: Arc<dyn BundleEngine>,
    entry: Arc<dyn EntryStrategy>,
    cache: Arc<BundleCache>,
    observers: Observers,
    in_flight: Mutex<HashMap<ModuleName, SharedBuild>>,
    sessions: Mutex<HashMap<ModuleName, JoinHandle<()>>>,
}

impl fmt::Debug for Bundler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundler")
            .field("root", &self.inner.root)
            .field("watch", &self.inner.config.watch)
            .field("cached", &self.inner.cache.len())
            .field("sessions", &self.inner.sessions.lock().len())
            .finish()
    }
}

impl Bundler {
    /// Create an orchestrator with the default engine and entry strategy.
    ///
    /// # Errors
    ///
    /// See [`BundlerBuilder::build`].
    pub fn new(config: BundlerConfig) -> Result<Self, ConfigError> {
        BundlerBuilder::new(config).build()
    }

    /// Start a [`BundlerBuilder`].
    pub fn builder(config: BundlerConfig) -> BundlerBuilder {
        BundlerBuilder::new(config)
    }

    /// The configuration in effect.
    pub fn config(&self) -> &BundlerConfig {
        &self.inner.config
    }

    /// Absolute root directory.
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// The bundle cache.
    pub fn cache(&self) -> &BundleCache {
        &self.inner.cache
    }

    /// The observer registry.
    pub fn observers(&self) -> &Observers {
        &self.inner.observers
    }

    /// Register an observer.
    pub fn subscribe(&self, observer: Arc<dyn BundleObserver>) -> SubscriptionId {
        self.inner.observers.subscribe(observer)
    }

    /// Remove an observer.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.observers.unsubscribe(id)
    }

    /// Middleware using the configured request pattern.
    pub fn middleware(&self) -> BundleMiddleware {
        BundleMiddleware::new(self.clone(), self.inner.pattern.clone())
    }

    /// Middleware using a custom request pattern with one capture group.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the pattern does not compile or does not
    /// have exactly one capture group.
    pub fn middleware_with_pattern(&self, pattern: &str) -> Result<BundleMiddleware, ConfigError> {
        Ok(BundleMiddleware::new(self.clone(), compile_pattern(pattern)?))
    }

    /// Normalize a build result, notifying `bundle_error` observers.
    pub fn normalize(&self, result: Result<String, BundleError>) -> BundleOutcome {
        normalize(result, &self.inner.observers)
    }

    /// Bundle for a raw module name, from cache when watch mode allows.
    pub async fn resolve(&self, module: &str) -> BundleOutcome {
        let module = match ModuleName::parse(module) {
            Ok(module) => module,
            Err(e) => return self.normalize(Err(e)),
        };

        if self.inner.config.watch {
            if let Some(outcome) = self.inner.cache.get(&module) {
                tracing::debug!(module = %module, "serving cached bundle");
                return outcome;
            }
        }

        self.build(&module).await
    }

    /// Build `module`, joining a build already in flight for it.
    pub async fn build(&self, module: &ModuleName) -> BundleOutcome {
        let shared = {
            let mut in_flight = self.inner.in_flight.lock();
            match in_flight.get(module) {
                Some(existing) => {
                    tracing::debug!(module = %module, "joining in-flight build");
                    existing.clone()
                }
                None => {
                    let task = tokio::spawn(Inner::run_build(
                        Arc::clone(&self.inner),
                        module.clone(),
                    ));
                    let build: SharedBuild = async move {
                        task.await.unwrap_or_else(|e| {
                            BundleOutcome::failure(BundleError::Engine(format!(
                                "build task failed: {e}"
                            )))
                        })
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(module.clone(), build.clone());
                    build
                }
            }
        };

        shared.await
    }

    /// Drop the cached bundle of `module` and stop watching it.
    ///
    /// Returns `true` if there was anything to remove.
    pub fn evict(&self, module: &ModuleName) -> bool {
        let removed = self.inner.cache.remove(module);
        let stopped = self.inner.stop_session(module);
        if removed || stopped {
            tracing::debug!(module = %module, "evicted bundle");
        }
        removed || stopped
    }

    /// Drop expired cache entries and their watch sessions.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let expired = self.inner.cache.purge_expired();
        for module in &expired {
            self.inner.stop_session(module);
        }
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "purged expired bundles");
        }
        expired.len()
    }

    /// Stop every watch session and drop the bundles they kept fresh.
    ///
    /// A later request for one of those modules builds it again.
    pub fn shutdown(&self) {
        let sessions: Vec<_> = self.inner.sessions.lock().drain().collect();
        for (module, task) in &sessions {
            task.abort();
            self.inner.cache.remove(module);
        }
        tracing::debug!(count = sessions.len(), "stopped watch sessions");
    }

    /// Modules with a live watch session.
    pub fn watched_modules(&self) -> Vec<ModuleName> {
        let mut sessions = self.inner.sessions.lock();
        sessions.retain(|_, task| !task.is_finished());
        sessions.keys().cloned().collect()
    }
}

/// Removes the in-flight entry when a build task ends, even by panic.
struct InFlightGuard {
    inner: Arc<Inner>,
    module: ModuleName,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.lock().remove(&self.module);
    }
}

impl Inner {
    async fn run_build(self: Arc<Self>, module: ModuleName) -> BundleOutcome {
        let _guard = InFlightGuard {
            inner: Arc::clone(&self),
            module: module.clone(),
        };

        let path = module.to_path(&self.root);
        let mut session = self.engine.create_session(&SessionOptions {
            watch: self.config.watch,
            engine: self.config.options.clone(),
        });

        self.entry.add_entries(session.as_mut(), &module, &path);
        for spec in &self.config.transforms {
            session.add_transform(spec.id(), spec.options().cloned());
        }
        self.observers
            .emit_pre_bundle(session.as_mut(), &module, &path);

        tracing::info!(module = %module, path = %path.display(), "building bundle");
        let outcome = self.bundle_once(session.as_mut(), &module).await;

        if self.config.watch {
            self.start_watching(session, module);
        }

        outcome
    }

    /// One engine invocation: bounded, normalized, announced.
    async fn bundle_once(
        &self,
        session: &mut dyn BundleSession,
        module: &ModuleName,
    ) -> BundleOutcome {
        let started = Instant::now();
        let options = BundleOptions {
            debug: self.config.debug,
        };

        let result = match self.config.build_timeout() {
            Some(limit) => tokio::time::timeout(limit, session.bundle(&options))
                .await
                .unwrap_or(Err(BundleError::Timeout(limit))),
            None => session.bundle(&options).await,
        };

        let outcome = normalize(result, &self.observers);
        if outcome.is_success() {
            tracing::info!(
                module = %module,
                duration_ms = started.elapsed().as_millis() as u64,
                bytes = outcome.source().len(),
                "bundle ready"
            );
        }

        self.observers.emit_new_source(module, &outcome);
        outcome
    }

    fn start_watching(self: &Arc<Self>, mut session: Box<dyn BundleSession>, module: ModuleName) {
        let Some(updates) = session.take_updates() else {
            // Nothing will refresh this entry, so it must not be served again
            tracing::warn!(module = %module, "session reports no changes, bundle will not be cached");
            self.cache.remove(&module);
            return;
        };

        let task = tokio::spawn(watch_session(
            Arc::downgrade(self),
            session,
            updates,
            module.clone(),
        ));

        if let Some(previous) = self.sessions.lock().insert(module, task) {
            previous.abort();
        }
    }

    fn stop_session(&self, module: &ModuleName) -> bool {
        match self.sessions.lock().remove(module) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for (_, task) in self.sessions.get_mut().drain() {
            task.abort();
        }
    }
}

/// Rebuild loop of one watch session.
async fn watch_session(
    inner: Weak<Inner>,
    mut session: Box<dyn BundleSession>,
    mut updates: mpsc::Receiver<SessionUpdate>,
    module: ModuleName,
) {
    while let Some(update) = updates.recv().await {
        let Some(debounce) = inner.upgrade().map(|inner| inner.config.debounce()) else {
            break;
        };
        if !debounce.is_zero() {
            tokio::time::sleep(debounce).await;
        }

        let mut paths = update.paths;
        while let Ok(more) = updates.try_recv() {
            paths.extend(more.paths);
        }
        paths.sort();
        paths.dedup();

        let Some(inner) = inner.upgrade() else {
            break;
        };

        tracing::info!(module = %module, changed = paths.len(), "rebuilding bundle");
        inner.observers.emit_source_changed(&module, &paths);
        inner.bundle_once(session.as_mut(), &module).await;
    }

    tracing::debug!(module = %module, "watch session ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoEngine {
        builds: Arc<AtomicUsize>,
    }

    struct EchoSession {
        entries: Vec<PathBuf>,
        builds: Arc<AtomicUsize>,
    }

    impl BundleEngine for EchoEngine {
        fn create_session(&self, _options: &SessionOptions) -> Box<dyn BundleSession> {
            Box::new(EchoSession {
                entries: Vec::new(),
                builds: self.builds.clone(),
            })
        }
    }

    #[async_trait]
    impl BundleSession for EchoSession {
        fn add_entry(&mut self, path: &Path) {
            self.entries.push(path.to_path_buf());
        }

        fn add_transform(&mut self, _id: &str, _options: Option<serde_json::Value>) {}

        async fn bundle(&mut self, _options: &BundleOptions) -> Result<String, BundleError> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{:?}", self.entries))
        }

        fn take_updates(&mut self) -> Option<mpsc::Receiver<SessionUpdate>> {
            None
        }
    }

    fn bundler(config: BundlerConfig) -> (Bundler, Arc<AtomicUsize>) {
        let builds = Arc::new(AtomicUsize::new(0));
        let bundler = Bundler::builder(config)
            .engine(Arc::new(EchoEngine {
                builds: builds.clone(),
            }))
            .build()
            .unwrap();
        (bundler, builds)
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let err = Bundler::new(BundlerConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));
    }

    #[test]
    fn test_pattern_is_checked_at_construction() {
        let config = BundlerConfig {
            pattern: Some("^(.+)\\.(js)$".to_string()),
            ..BundlerConfig::with_root("/srv/app")
        };
        assert!(Bundler::new(config).is_err());
    }

    #[tokio::test]
    async fn test_default_entry_is_module_under_root() {
        let temp = tempfile::TempDir::new().unwrap();
        let (bundler, _) = bundler(BundlerConfig {
            watch: false,
            ..BundlerConfig::with_root(temp.path())
        });

        let outcome = bundler.resolve("/sub/thing").await;
        let expected = bundler.root().join("sub").join("thing");
        assert_eq!(outcome.source(), format!("{:?}", vec![expected]));
    }

    #[tokio::test]
    async fn test_custom_entry_strategy() {
        let temp = tempfile::TempDir::new().unwrap();
        let builds = Arc::new(AtomicUsize::new(0));
        let bundler = Bundler::builder(BundlerConfig {
            watch: false,
            ..BundlerConfig::with_root(temp.path())
        })
        .engine(Arc::new(EchoEngine { builds }))
        .add_file(|session: &mut dyn BundleSession, _module: &ModuleName, path: &Path| {
            session.add_entry(Path::new("/polyfills.js"));
            session.add_entry(path);
        })
        .build()
        .unwrap();

        let outcome = bundler.resolve("main").await;
        assert!(outcome.source().starts_with("[\"/polyfills.js\""));
    }

    #[tokio::test]
    async fn test_session_without_updates_is_not_cached() {
        let temp = tempfile::TempDir::new().unwrap();
        let (bundler, builds) = bundler(BundlerConfig::with_root(temp.path()));

        bundler.resolve("main").await;
        bundler.resolve("main").await;

        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert!(bundler.cache().is_empty());
        assert!(bundler.watched_modules().is_empty());
    }
}

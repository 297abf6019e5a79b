//! Shared test helpers: a scripted engine that counts what it is asked to do.

#![allow(dead_code)]

use async_trait::async_trait;
use devbundle::{
    BundleEngine, BundleError, BundleObserver, BundleOptions, BundleOutcome, BundleSession,
    Bundler, BundlerConfig, ModuleName, SessionOptions, SessionUpdate,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// What the scripted engine has been asked to do.
#[derive(Default)]
pub struct EngineLog {
    pub sessions: AtomicUsize,
    pub builds: AtomicUsize,
    /// Transforms of each session, in the order they were added
    pub transforms: Mutex<Vec<Vec<(String, Option<Value>)>>>,
    /// Change channels of watch sessions
    pub senders: Mutex<Vec<mpsc::Sender<SessionUpdate>>>,
    /// Delay applied to every build
    pub delay: Mutex<Duration>,
    /// When set, builds fail with this message
    pub failure: Mutex<Option<String>>,
    /// Hand out change channels to watch sessions
    pub reports_changes: Mutex<bool>,
}

impl EngineLog {
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    /// Signal a change on every live watch session.
    pub fn touch(&self, path: &str) {
        for sender in self.senders.lock().iter() {
            let _ = sender.try_send(SessionUpdate {
                paths: vec![PathBuf::from(path)],
            });
        }
    }
}

/// Engine whose bundles are `build #<n> of <entries>`.
pub struct ScriptedEngine {
    pub log: Arc<EngineLog>,
}

impl ScriptedEngine {
    pub fn new() -> (Arc<Self>, Arc<EngineLog>) {
        let log = Arc::new(EngineLog::default());
        *log.reports_changes.lock() = true;
        (Arc::new(Self { log: log.clone() }), log)
    }
}

struct ScriptedSession {
    log: Arc<EngineLog>,
    slot: usize,
    entries: Vec<PathBuf>,
    updates: Option<mpsc::Receiver<SessionUpdate>>,
}

impl BundleEngine for ScriptedEngine {
    fn create_session(&self, options: &SessionOptions) -> Box<dyn BundleSession> {
        self.log.sessions.fetch_add(1, Ordering::SeqCst);

        let slot = {
            let mut transforms = self.log.transforms.lock();
            transforms.push(Vec::new());
            transforms.len() - 1
        };

        let updates = if options.watch && *self.log.reports_changes.lock() {
            let (tx, rx) = mpsc::channel(8);
            self.log.senders.lock().push(tx);
            Some(rx)
        } else {
            None
        };

        Box::new(ScriptedSession {
            log: self.log.clone(),
            slot,
            entries: Vec::new(),
            updates,
        })
    }
}

#[async_trait]
impl BundleSession for ScriptedSession {
    fn add_entry(&mut self, path: &Path) {
        self.entries.push(path.to_path_buf());
    }

    fn add_transform(&mut self, id: &str, options: Option<Value>) {
        self.log.transforms.lock()[self.slot].push((id.to_string(), options));
    }

    async fn bundle(&mut self, _options: &BundleOptions) -> Result<String, BundleError> {
        let n = self.log.builds.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = *self.log.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failure = self.log.failure.lock().clone();
        match failure {
            Some(message) => Err(BundleError::Engine(message)),
            None => Ok(format!("build #{n} of {:?}", self.entries)),
        }
    }

    fn take_updates(&mut self) -> Option<mpsc::Receiver<SessionUpdate>> {
        self.updates.take()
    }
}

/// Bundler over a scripted engine rooted at `root`.
pub fn scripted_bundler(config: BundlerConfig) -> (Bundler, Arc<EngineLog>) {
    let (engine, log) = ScriptedEngine::new();
    let bundler = Bundler::builder(config).engine(engine).build().unwrap();
    (bundler, log)
}

/// Records every notification as a line of text.
#[derive(Default)]
pub struct EventLog(pub Mutex<Vec<String>>);

impl EventLog {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0.lock().iter().filter(|l| l.starts_with(prefix)).count()
    }
}

impl BundleObserver for EventLog {
    fn pre_bundle(&self, _session: &mut dyn BundleSession, module: &ModuleName, _path: &Path) {
        self.0.lock().push(format!("pre-bundle {module}"));
    }

    fn source_changed(&self, module: &ModuleName, _paths: &[PathBuf]) {
        self.0.lock().push(format!("source-changed {module}"));
    }

    fn new_source(&self, module: &ModuleName, outcome: &BundleOutcome) {
        self.0
            .lock()
            .push(format!("new-source {module} {}", outcome.is_success()));
    }

    fn bundle_error(&self, error: &BundleError) {
        self.0.lock().push(format!("bundle-error {error}"));
    }
}

/// Poll `check` until it returns true or `limit` passes.
pub async fn eventually<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

//! Built-in browserify-style CommonJS engine.
//!
//! Resolution is delegated to `oxc_resolver`, dependency discovery to a
//! lexical `require` scan, watching to `notify`. Each session walks the graph
//! from its entries, runs the configured transforms over every JavaScript
//! file and packs the result behind a small `require` runtime.

mod pack;
mod scan;

use crate::engine::{BundleEngine, BundleOptions, BundleSession, SessionOptions, SessionUpdate};
use crate::engine::watcher::SessionWatcher;
use crate::error::BundleError;
use crate::transform::{SourceTransform, TransformRegistry};
use async_trait::async_trait;
use oxc_resolver::{ResolveOptions, Resolver};
use pack::PackedModule;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Engine-specific options, read from the `options` pass-through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommonJsOptions {
    /// Define `global`, `__filename` and `__dirname` in every module
    pub insert_globals: bool,

    /// Define them only in modules that mention them (ignored when
    /// `insert_globals` is set)
    pub detect_globals: bool,

    /// Files whose `require` calls are not scanned. Matched against the end
    /// of the resolved path (`vendor/jquery.js`) or the file name.
    pub no_parse: Vec<String>,
}

impl Default for CommonJsOptions {
    fn default() -> Self {
        Self {
            insert_globals: true,
            detect_globals: false,
            no_parse: Vec::new(),
        }
    }
}

impl CommonJsOptions {
    /// Interpret pass-through options. `null` yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::InvalidOptions`] for values of the wrong shape.
    pub fn from_value(value: &Value) -> Result<Self, BundleError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone()).map_err(|e| BundleError::InvalidOptions(e.to_string()))
    }

    fn skips_parsing(&self, path: &Path) -> bool {
        self.no_parse.iter().any(|pattern| path.ends_with(pattern))
    }
}

/// The built-in engine.
#[derive(Debug, Clone)]
pub struct CommonJsEngine {
    transforms: TransformRegistry,
}

impl CommonJsEngine {
    /// Create an engine that knows the given transforms.
    pub fn new(transforms: TransformRegistry) -> Self {
        Self { transforms }
    }

    /// Transforms known to this engine.
    pub fn transforms(&self) -> &TransformRegistry {
        &self.transforms
    }
}

impl Default for CommonJsEngine {
    fn default() -> Self {
        Self::new(TransformRegistry::with_builtins())
    }
}

impl BundleEngine for CommonJsEngine {
    fn create_session(&self, options: &SessionOptions) -> Box<dyn BundleSession> {
        let mut session = CommonJsSession {
            registry: self.transforms.clone(),
            options: options.engine.clone(),
            entries: Vec::new(),
            transforms: Vec::new(),
            watcher: None,
            updates: None,
        };

        if options.watch {
            let (tx, rx) = mpsc::channel(16);
            match SessionWatcher::new(tx) {
                Ok(watcher) => {
                    session.watcher = Some(watcher);
                    session.updates = Some(rx);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "file watcher unavailable, session will not rebuild");
                }
            }
        }

        Box::new(session)
    }
}

/// A session of the built-in engine.
pub struct CommonJsSession {
    registry: TransformRegistry,
    options: Value,
    entries: Vec<PathBuf>,
    transforms: Vec<(String, Value)>,
    watcher: Option<SessionWatcher>,
    updates: Option<mpsc::Receiver<SessionUpdate>>,
}

impl CommonJsSession {
    /// Entries added so far.
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    fn resolve_transforms(&self) -> Result<Vec<ActiveTransform>, BundleError> {
        self.transforms
            .iter()
            .map(|(id, options)| {
                self.registry
                    .get(id)
                    .map(|transform| ActiveTransform {
                        id: id.clone(),
                        transform,
                        options: options.clone(),
                    })
                    .ok_or_else(|| BundleError::UnknownTransform(id.clone()))
            })
            .collect()
    }
}

#[async_trait]
impl BundleSession for CommonJsSession {
    fn add_entry(&mut self, path: &Path) {
        self.entries.push(path.to_path_buf());
    }

    fn add_transform(&mut self, id: &str, options: Option<Value>) {
        self.transforms
            .push((id.to_string(), options.unwrap_or(Value::Null)));
    }

    async fn bundle(&mut self, options: &BundleOptions) -> Result<String, BundleError> {
        let prepared = CommonJsOptions::from_value(&self.options)
            .and_then(|engine_options| Ok((engine_options, self.resolve_transforms()?)));

        // Paths are watched as soon as they are touched, so a build that is
        // dropped half way (timeout) still leaves its files watched.
        let mut graph = GraphWalk::new(self.watcher.as_mut());
        for entry in &self.entries {
            graph.touch_candidates(entry);
        }

        let result = match prepared {
            Ok((engine_options, transforms)) => {
                graph.collect(&self.entries, &engine_options, &transforms).await
            }
            Err(e) => Err(e),
        };
        let touched = graph.into_touched();

        // Track even on failure so fixing the broken file triggers a rebuild
        if let Some(watcher) = self.watcher.as_mut() {
            watcher.track(touched);
        }

        let (modules, entries) = result?;
        let base = self
            .entries
            .first()
            .and_then(|entry| entry.parent())
            .unwrap_or_else(|| Path::new("/"));

        tracing::debug!(modules = modules.len(), "packed bundle");
        Ok(pack::render(&modules, &entries, base, options.debug))
    }

    fn take_updates(&mut self) -> Option<mpsc::Receiver<SessionUpdate>> {
        self.updates.take()
    }
}

struct ActiveTransform {
    id: String,
    transform: Arc<dyn SourceTransform>,
    options: Value,
}

/// State of one walk over the dependency graph.
struct GraphWalk<'w> {
    resolver: Resolver,
    watcher: Option<&'w mut SessionWatcher>,
    /// Every path the build looked at, resolved or not
    touched: HashSet<PathBuf>,
    indices: HashMap<PathBuf, usize>,
    order: Vec<PathBuf>,
}

impl<'w> GraphWalk<'w> {
    fn new(watcher: Option<&'w mut SessionWatcher>) -> Self {
        // A fresh resolver per build: its file system cache must not outlive
        // the edits that triggered the rebuild.
        let resolver = Resolver::new(ResolveOptions {
            extensions: vec![".js".into(), ".json".into()],
            main_fields: vec!["browser".into(), "main".into()],
            condition_names: vec!["require".into(), "browser".into(), "default".into()],
            ..ResolveOptions::default()
        });

        Self {
            resolver,
            watcher,
            touched: HashSet::new(),
            indices: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn into_touched(self) -> HashSet<PathBuf> {
        self.touched
    }

    fn touch(&mut self, path: PathBuf) {
        if let Some(watcher) = self.watcher.as_deref_mut() {
            watcher.watch_file(&path);
        }
        self.touched.insert(path);
    }

    /// Touch `path` and the files it could resolve to once created.
    fn touch_candidates(&mut self, path: &Path) {
        for extension in ["js", "json"] {
            let mut with_ext = path.as_os_str().to_os_string();
            with_ext.push(".");
            with_ext.push(extension);
            self.touch(PathBuf::from(with_ext));
        }
        self.touch(path.to_path_buf());
    }

    async fn collect(
        &mut self,
        entries: &[PathBuf],
        options: &CommonJsOptions,
        transforms: &[ActiveTransform],
    ) -> Result<(Vec<PackedModule>, Vec<usize>), BundleError> {
        if entries.is_empty() {
            return Err(BundleError::NoEntries);
        }

        let mut queue = VecDeque::new();
        let mut entry_indices = Vec::with_capacity(entries.len());

        for entry in entries {
            let dir = entry.parent().unwrap_or_else(|| Path::new("/"));
            let specifier = entry.to_string_lossy();
            let resolved = self.resolve(dir, &specifier)?;
            let (index, is_new) = self.intern(resolved.clone());
            if is_new {
                queue.push_back(resolved);
            }
            entry_indices.push(index);
        }

        let mut modules: BTreeMap<usize, PackedModule> = BTreeMap::new();

        while let Some(path) = queue.pop_front() {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| BundleError::Io {
                    path: path.clone(),
                    source,
                })?;

            let is_json = path.extension().is_some_and(|ext| ext == "json");
            let source = if is_json {
                format!("module.exports = {};", raw.trim_end())
            } else {
                apply_transforms(&path, raw, transforms)?
            };

            let mut deps = BTreeMap::new();
            if !is_json && !options.skips_parsing(&path) {
                let dir = path.parent().unwrap_or_else(|| Path::new("/"));
                for specifier in scan::find_requires(&source) {
                    let resolved = self.resolve(dir, &specifier)?;
                    let (index, is_new) = self.intern(resolved.clone());
                    if is_new {
                        queue.push_back(resolved);
                    }
                    deps.insert(specifier, index);
                }
            }

            let insert_globals = !is_json
                && (options.insert_globals
                    || (options.detect_globals && scan::mentions_globals(&source)));

            let index = self.indices[&path];
            modules.insert(
                index,
                PackedModule {
                    index,
                    path,
                    source,
                    deps,
                    insert_globals,
                },
            );
        }

        Ok((modules.into_values().collect(), entry_indices))
    }

    fn resolve(&mut self, dir: &Path, specifier: &str) -> Result<PathBuf, BundleError> {
        match self.resolver.resolve(dir, specifier) {
            Ok(resolution) => {
                let path = resolution.path().to_path_buf();
                self.touch(path.clone());
                Ok(path)
            }
            Err(e) => {
                tracing::debug!(specifier, dir = %dir.display(), error = ?e, "resolution failed");
                // Watch where the file would appear so creating it rebuilds
                if specifier.starts_with('.') || Path::new(specifier).is_absolute() {
                    self.touch_candidates(&path_clean::clean(dir.join(specifier)));
                }
                Err(BundleError::ModuleNotFound {
                    specifier: specifier.to_string(),
                    from: dir.to_path_buf(),
                })
            }
        }
    }

    fn intern(&mut self, path: PathBuf) -> (usize, bool) {
        if let Some(index) = self.indices.get(&path) {
            return (*index, false);
        }
        let index = self.order.len();
        self.indices.insert(path.clone(), index);
        self.order.push(path);
        (index, true)
    }
}

fn apply_transforms(
    path: &Path,
    mut source: String,
    transforms: &[ActiveTransform],
) -> Result<String, BundleError> {
    for active in transforms {
        source = active
            .transform
            .transform(path, &source, &active.options)
            .map_err(|e| BundleError::Transform {
                transform: active.id.clone(),
                file: path.to_path_buf(),
                message: e.to_string(),
            })?;
    }
    Ok(source)
}

//! Source transforms applied to every module file during bundling.
//!
//! Transforms are referenced by id from configuration ([`TransformSpec`]) and
//! looked up in a [`TransformRegistry`] owned by the engine. They run in
//! configuration order, each one seeing the previous one's output.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// A configured transform: a bare id, or an `(options, id)` pair.
///
/// Deserializes from `"envify"` or `[{"env": {...}}, "envify"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransformSpec {
    /// Transform applied with default options
    Simple(String),
    /// Transform applied with explicit options
    WithOptions(Value, String),
}

impl TransformSpec {
    /// The transform id.
    pub fn id(&self) -> &str {
        match self {
            TransformSpec::Simple(id) | TransformSpec::WithOptions(_, id) => id,
        }
    }

    /// The explicit options, if any.
    pub fn options(&self) -> Option<&Value> {
        match self {
            TransformSpec::Simple(_) => None,
            TransformSpec::WithOptions(options, _) => Some(options),
        }
    }
}

/// Failure reported by a transform. The engine attaches the transform id and
/// file to build a [`BundleError::Transform`](crate::BundleError::Transform).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransformError(pub String);

/// A source-to-source transformation.
pub trait SourceTransform: Send + Sync {
    /// Id used to reference the transform from configuration.
    fn name(&self) -> &str;

    /// Transform one file. `options` is `Value::Null` when none were configured.
    fn transform(&self, file: &Path, source: &str, options: &Value)
    -> Result<String, TransformError>;
}

/// Transforms known to an engine, keyed by id.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: HashMap<String, Arc<dyn SourceTransform>>,
}

impl TransformRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in transforms (`envify`, `replace`).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Envify));
        registry.register(Arc::new(Replace));
        registry
    }

    /// Register a transform under its own name, replacing any previous one.
    pub fn register(&mut self, transform: Arc<dyn SourceTransform>) {
        self.transforms
            .insert(transform.name().to_string(), transform);
    }

    /// Look up a transform by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn SourceTransform>> {
        self.transforms.get(id).cloned()
    }

    /// Check whether an id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.transforms.contains_key(id)
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.transforms.keys().collect();
        names.sort();
        f.debug_struct("TransformRegistry")
            .field("transforms", &names)
            .finish()
    }
}

/// Inline `process.env.NAME` references as string literals.
///
/// Values come from the `env` object in the options first, then from the
/// process environment. Unknown names are left untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Envify;

impl SourceTransform for Envify {
    fn name(&self) -> &str {
        "envify"
    }

    fn transform(
        &self,
        _file: &Path,
        source: &str,
        options: &Value,
    ) -> Result<String, TransformError> {
        static ENV_REF: once_cell::sync::Lazy<regex::Regex> = once_cell::sync::Lazy::new(|| {
            regex::Regex::new(r"\bprocess\.env\.([A-Za-z_$][A-Za-z0-9_$]*)")
                .expect("envify pattern is valid")
        });

        let overrides = match options.get("env") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map),
            Some(other) => {
                return Err(TransformError(format!(
                    "'env' must be an object, got {other}"
                )));
            }
        };

        let replaced = ENV_REF.replace_all(source, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            let value = overrides
                .and_then(|map| map.get(name))
                .map(|value| match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .or_else(|| std::env::var(name).ok());

            match value {
                Some(value) => Value::String(value).to_string(),
                None => caps[0].to_string(),
            }
        });

        Ok(replaced.into_owned())
    }
}

/// Literal search-and-replace driven by the `values` object in the options.
#[derive(Debug, Clone, Copy, Default)]
pub struct Replace;

impl SourceTransform for Replace {
    fn name(&self) -> &str {
        "replace"
    }

    fn transform(
        &self,
        _file: &Path,
        source: &str,
        options: &Value,
    ) -> Result<String, TransformError> {
        let Some(values) = options.get("values") else {
            return Ok(source.to_string());
        };
        let Value::Object(values) = values else {
            return Err(TransformError("'values' must be an object".to_string()));
        };

        let mut output = source.to_string();
        for (from, to) in values {
            if from.is_empty() {
                continue;
            }
            let to = match to {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            output = output.replace(from.as_str(), &to);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_spec_deserializes_both_shapes() {
        let specs: Vec<TransformSpec> =
            serde_json::from_value(json!(["envify", [{"values": {"a": "b"}}, "replace"]]))
                .unwrap();

        assert_eq!(specs[0], TransformSpec::Simple("envify".to_string()));
        assert_eq!(specs[1].id(), "replace");
        assert_eq!(specs[1].options(), Some(&json!({"values": {"a": "b"}})));
    }

    #[test]
    fn test_envify_uses_options_first() {
        let out = Envify
            .transform(
                Path::new("a.js"),
                "if (process.env.NODE_ENV === 'x') {}",
                &json!({"env": {"NODE_ENV": "development"}}),
            )
            .unwrap();
        assert_eq!(out, "if (\"development\" === 'x') {}");
    }

    #[test]
    fn test_envify_leaves_unknown_names() {
        let source = "var v = process.env.DEVBUNDLE_SURELY_UNSET_VARIABLE;";
        let out = Envify
            .transform(Path::new("a.js"), source, &Value::Null)
            .unwrap();
        assert_eq!(out, source);
    }

    #[test]
    fn test_envify_rejects_bad_options() {
        let err = Envify
            .transform(Path::new("a.js"), "", &json!({"env": 3}))
            .unwrap_err();
        assert!(err.0.contains("'env' must be an object"));
    }

    #[test]
    fn test_replace() {
        let out = Replace
            .transform(
                Path::new("a.js"),
                "hello __NAME__",
                &json!({"values": {"__NAME__": "world"}}),
            )
            .unwrap();
        assert_eq!(out, "hello world");

        let untouched = Replace
            .transform(Path::new("a.js"), "same", &Value::Null)
            .unwrap();
        assert_eq!(untouched, "same");
    }

    #[test]
    fn test_registry_builtins() {
        let registry = TransformRegistry::with_builtins();
        assert!(registry.contains("envify"));
        assert!(registry.contains("replace"));
        assert!(registry.get("babelify").is_none());
    }

    #[test]
    fn test_transform_error_is_a_std_error() {
        let err = TransformError("'values' must be an object".to_string());
        assert_eq!(err.to_string(), "'values' must be an object");
        assert_eq!(err.clone(), err);

        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
        assert!(boxed.source().is_none());
        assert_eq!(boxed.to_string(), "'values' must be an object");
    }
}

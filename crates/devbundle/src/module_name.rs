//! Canonical module names.
//!
//! A module name comes straight from a request path, so it is untrusted. It is
//! cleaned lexically once, here, and every map in the orchestrator is keyed by
//! the cleaned form. `/sub/./thing`, `sub//thing` and `sub/x/../thing` all
//! name the same module.

use crate::error::BundleError;
use path_clean::PathClean;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A validated, root-relative module name such as `sub/thing`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleName(String);

impl ModuleName {
    /// Parse and canonicalize a raw module name.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::InvalidModule`] when the name is empty, contains
    /// a NUL byte or backslash, or would escape the root directory.
    pub fn parse(raw: &str) -> Result<Self, BundleError> {
        let invalid = |reason: &str| BundleError::InvalidModule {
            name: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.contains('\0') || raw.contains('\\') {
            return Err(invalid("contains a forbidden character"));
        }

        let trimmed = raw.trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(invalid("name is empty"));
        }

        let cleaned = Path::new(trimmed).clean();
        let mut segments = Vec::new();
        for component in cleaned.components() {
            match component {
                Component::Normal(segment) => {
                    let segment = segment
                        .to_str()
                        .ok_or_else(|| invalid("name is not valid UTF-8"))?;
                    segments.push(segment);
                }
                Component::CurDir => {}
                Component::ParentDir => return Err(invalid("path escapes the root directory")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("absolute paths are not allowed"));
                }
            }
        }

        if segments.is_empty() {
            return Err(invalid("name is empty"));
        }

        Ok(Self(segments.join("/")))
    }

    /// The canonical name as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve the name against a root directory.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |path, segment| path.join(segment))
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModuleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

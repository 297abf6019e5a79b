//! Turning build results into servable outcomes.

use crate::error::BundleError;
use crate::events::Observers;
use std::sync::Arc;

/// A normalized build result: always a usable string.
///
/// Failed builds carry their error next to its rendered text, so callers can
/// still tell them apart (for status codes or live-reload notifications)
/// without the text ever going missing. Cloning is cheap; coalesced callers
/// and the cache share the same buffers.
#[derive(Debug, Clone)]
pub struct BundleOutcome {
    source: Arc<str>,
    error: Option<Arc<BundleError>>,
}

impl BundleOutcome {
    /// Outcome of a successful build.
    pub fn success(source: impl Into<Arc<str>>) -> Self {
        Self {
            source: source.into(),
            error: None,
        }
    }

    /// Outcome of a failed build. The source is the error's display text.
    pub fn failure(error: BundleError) -> Self {
        Self {
            source: error.to_string().into(),
            error: Some(Arc::new(error)),
        }
    }

    /// Bundle text, or the error text of a failed build.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Shared handle to the source buffer.
    pub fn shared_source(&self) -> Arc<str> {
        Arc::clone(&self.source)
    }

    /// The build error, if the build failed.
    pub fn error(&self) -> Option<&BundleError> {
        self.error.as_deref()
    }

    /// Whether the build succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Normalize a build result.
///
/// Errors are announced to `bundle_error` observers and converted to their
/// display text; successful output passes through unchanged.
pub fn normalize(result: Result<String, BundleError>, observers: &Observers) -> BundleOutcome {
    match result {
        Ok(source) => BundleOutcome::success(source),
        Err(error) => {
            tracing::warn!(error = %error, "bundle failed");
            observers.emit_bundle_error(&error);
            BundleOutcome::failure(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BundleObserver;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct ErrorLog(Mutex<Vec<String>>);

    impl BundleObserver for ErrorLog {
        fn bundle_error(&self, error: &BundleError) {
            self.0.lock().push(error.to_string());
        }
    }

    #[test]
    fn test_success_passes_through() {
        let observers = Observers::new();
        let log = Arc::new(ErrorLog::default());
        observers.subscribe(log.clone());

        let outcome = normalize(Ok("module.exports = 1;".to_string()), &observers);
        assert_eq!(outcome.source(), "module.exports = 1;");
        assert!(outcome.is_success());
        assert!(log.0.lock().is_empty());
    }

    #[test]
    fn test_error_becomes_text_and_is_announced() {
        let observers = Observers::new();
        let log = Arc::new(ErrorLog::default());
        observers.subscribe(log.clone());

        let error = BundleError::UnknownTransform("coffeeify".to_string());
        let expected = error.to_string();

        let outcome = normalize(Err(error), &observers);
        assert_eq!(outcome.source(), expected);
        assert!(matches!(
            outcome.error(),
            Some(BundleError::UnknownTransform(id)) if id == "coffeeify"
        ));
        assert_eq!(*log.0.lock(), vec![expected]);
    }
}

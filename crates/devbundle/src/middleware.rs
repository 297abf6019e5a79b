//! HTTP middleware serving bundles.
//!
//! Requests whose path matches the pattern are answered with the bundle of
//! the captured module name; everything else passes through untouched.
//!
//! ```no_run
//! use axum::{Router, middleware::from_fn_with_state};
//! use devbundle::{Bundler, BundlerConfig, serve_bundles};
//!
//! # fn app() -> Result<Router, devbundle::ConfigError> {
//! let bundler = Bundler::new(BundlerConfig::with_root("./public"))?;
//! let app = Router::new().layer(from_fn_with_state(bundler.middleware(), serve_bundles));
//! # Ok(app)
//! # }
//! ```

use crate::bundler::Bundler;
use crate::error::ConfigError;
use crate::events::ResponseContext;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::Response,
};
use regex::Regex;

/// Bundle-serving middleware state.
#[derive(Debug, Clone)]
pub struct BundleMiddleware {
    bundler: Bundler,
    pattern: Regex,
    failed_status: StatusCode,
}

impl BundleMiddleware {
    pub(crate) fn new(bundler: Bundler, pattern: Regex) -> Self {
        let failed_status =
            StatusCode::from_u16(bundler.config().failed_build_status).unwrap_or(StatusCode::OK);
        Self {
            bundler,
            pattern,
            failed_status,
        }
    }

    /// The orchestrator behind this middleware.
    pub fn bundler(&self) -> &Bundler {
        &self.bundler
    }

    /// The request pattern.
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Module name captured from a request path, if it matches.
    pub fn match_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        self.pattern
            .captures(path)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Answer with the bundle of `module`.
    pub async fn respond(&self, module: &str) -> Response {
        let outcome = self.bundler.resolve(module).await;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/javascript"),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        self.bundler
            .observers()
            .emit_pre_response(&mut ResponseContext {
                module,
                error: outcome.error(),
                headers: &mut headers,
                source: outcome.source(),
            });

        let mut response = Response::new(Body::from(outcome.source().to_owned()));
        *response.status_mut() = if outcome.is_success() {
            StatusCode::OK
        } else {
            self.failed_status
        };
        *response.headers_mut() = headers;
        response
    }
}

/// Axum middleware function; use with
/// [`from_fn_with_state`](axum::middleware::from_fn_with_state).
pub async fn serve_bundles(
    State(middleware): State<BundleMiddleware>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    match middleware.match_path(&path) {
        Some(module) => {
            tracing::debug!(path = %path, module, "serving bundle request");
            middleware.respond(module).await
        }
        None => next.run(request).await,
    }
}

/// Compile a request pattern, which must have exactly one capture group.
pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    let regex = Regex::new(pattern)?;
    let groups = regex.captures_len() - 1;
    if groups != 1 {
        return Err(ConfigError::InvalidValue {
            field: "pattern".to_string(),
            value: pattern.to_string(),
            hint: format!(
                "The pattern must have exactly one capture group for the module name, found {groups}"
            ),
        });
    }
    Ok(regex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BundlerConfig, DEFAULT_PATTERN};

    fn middleware(pattern: &str) -> BundleMiddleware {
        let bundler = Bundler::new(BundlerConfig::with_root("/srv/app")).unwrap();
        bundler.middleware_with_pattern(pattern).unwrap()
    }

    #[test]
    fn test_default_pattern_captures_module() {
        let mw = middleware(DEFAULT_PATTERN);
        assert_eq!(mw.match_path("/main.js"), Some("/main"));
        assert_eq!(mw.match_path("/sub/thing.js"), Some("/sub/thing"));
        assert_eq!(mw.match_path("/main.css"), None);
        assert_eq!(mw.match_path("/main.jsx"), None);
    }

    #[test]
    fn test_custom_pattern() {
        let mw = middleware(r"^/bundles/(.+)\.bundle\.js$");
        assert_eq!(mw.match_path("/bundles/app.bundle.js"), Some("app"));
        assert_eq!(mw.match_path("/app.js"), None);
    }

    #[test]
    fn test_pattern_group_count() {
        assert!(compile_pattern(r"^/(.+)\.js$").is_ok());
        assert!(matches!(
            compile_pattern(r"^/.+\.js$"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            compile_pattern(r"^/(.+)\.(js)$"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(compile_pattern("(unclosed"), Err(ConfigError::Pattern(_))));
    }

    #[test]
    fn test_failed_status_from_config() {
        let bundler = Bundler::new(BundlerConfig {
            failed_build_status: 500,
            ..BundlerConfig::with_root("/srv/app")
        })
        .unwrap();
        assert_eq!(
            bundler.middleware().failed_status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

//! # devbundle
//!
//! Development-time bundling middleware. A request for `/<module>.js` is
//! answered with one script containing the module and everything it
//! requires. In watch mode bundles are cached and kept fresh by background
//! rebuilds whenever one of their files changes, so the browser always gets
//! the latest build without waiting for it.
//!
//! ## Example
//!
//! ```no_run
//! use axum::{Router, middleware::from_fn_with_state};
//! use devbundle::{Bundler, BundlerConfig, serve_bundles};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let bundler = Bundler::new(BundlerConfig::with_root("./public"))?;
//!
//! let app = Router::new().layer(from_fn_with_state(bundler.middleware(), serve_bundles));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Layout
//!
//! - [`Bundler`]: cache-or-build decisions, watch sessions, coalescing
//! - [`BundleCache`]: watch-mode cache, filled by observing new sources
//! - [`Observers`]: lifecycle notifications
//! - [`engine`]: the engine interface and the built-in CommonJS engine
//! - [`BundleMiddleware`]: the axum middleware

pub mod bundler;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod middleware;
pub mod module_name;
pub mod normalize;
pub mod transform;

pub use bundler::{Bundler, BundlerBuilder, EntryStrategy, RootEntry};
pub use cache::{BundleCache, CacheEntry};
pub use config::{BundlerConfig, DEFAULT_PATTERN};
pub use engine::{
    BundleEngine, BundleOptions, BundleSession, CommonJsEngine, CommonJsOptions, SessionOptions,
    SessionUpdate,
};
pub use error::{BundleError, ConfigError};
pub use events::{BundleObserver, Observers, ResponseContext, SubscriptionId};
pub use middleware::{BundleMiddleware, serve_bundles};
pub use module_name::ModuleName;
pub use normalize::{BundleOutcome, normalize};
pub use transform::{SourceTransform, TransformError, TransformRegistry, TransformSpec};

//! Command implementations for the devbundle CLI.
//!
//! - [`serve`] - Development server answering bundle requests
//! - [`bundle`] - One-shot bundle of a single module
//!
//! Each command provides an `execute` function that takes the parsed
//! arguments and returns a Result.

pub mod bundle;
pub mod serve;

pub use bundle::execute as bundle_execute;
pub use serve::execute as serve_execute;

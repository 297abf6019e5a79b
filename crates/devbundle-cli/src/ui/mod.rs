//! Terminal status output.
//!
//! ```no_run
//! use devbundle_cli::ui;
//!
//! ui::init_colors(false);
//! ui::success("Serving bundles on http://127.0.0.1:3000");
//! ui::warning("Watch mode disabled: every request rebuilds");
//! ```

mod messages;

use std::sync::atomic::{AtomicBool, Ordering};

pub use messages::{info, success, warning};

static COLORS: AtomicBool = AtomicBool::new(true);

/// Check if color output should be enabled.
///
/// Respects NO_COLOR and FORCE_COLOR, then falls back to whether stderr is
/// attended.
pub fn should_use_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }
    console::user_attended_stderr()
}

/// Initialize color support based on the environment and `--no-color`.
pub fn init_colors(no_color: bool) {
    COLORS.store(!no_color && should_use_color(), Ordering::Relaxed);
}

pub(crate) fn colors_enabled() -> bool {
    COLORS.load(Ordering::Relaxed)
}

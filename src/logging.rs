//! Ambient logging setup (§10.1).
//!
//! Standardizes on `tracing` + `tracing-subscriber`, the stack the
//! teacher crate already depends on for its own (net-module-scoped)
//! subscriber. `COCOTB_SCHEDULER_DEBUG` raises the scheduler's own
//! target to `DEBUG` by adding an extra directive on top of whatever
//! `RUST_LOG`/default the process already configured, so enabling it
//! never fights the user's own filter.

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber for a standalone binary or
/// test harness embedding this crate.
///
/// Does nothing (and does not panic) if a global subscriber is already installed.
pub fn init(scheduler_debug: bool) {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if scheduler_debug {
        if let Ok(directive) = "cosched=debug".parse() {
            filter = filter.add_directive(directive);
        }
    }
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

//! Configuration surface (§6.3): environment variables and simulator
//! plusargs consumed at scheduler construction.
//!
//! The fallback-chain parsing mirrors the upstream runtime's own
//! key/value option parser (`runtime::logger::env`'s `RUST_LOG`-style
//! mini-parser): split on a delimiter, build an override table, warn
//! on deprecated spellings.

use std::collections::HashMap;
use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

/// Scheduler-wide configuration, read from the process environment at
/// construction time.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// `COCOTB_TOPLEVEL`: the root signal path. A leading `library.` component is stripped.
    pub toplevel: Option<String>,
    /// The random seed; `COCOTB_RANDOM_SEED`, falling back to the
    /// deprecated `RANDOM_SEED`, a `ntb_random_seed`/`seed` plusarg, or
    /// the current epoch time.
    pub random_seed: u64,
    /// `COCOTB_USER_COVERAGE` / `COVERAGE`.
    pub user_coverage: bool,
    /// `COCOTB_COVERAGE_RCFILE` / `COVERAGE_RCFILE`.
    pub coverage_rcfile: Option<String>,
    /// `COCOTB_PDB_ON_EXCEPTION`.
    pub pdb_on_exception: bool,
    /// `COCOTB_SCHEDULER_DEBUG`: raises the scheduler's own tracing target to DEBUG.
    pub scheduler_debug: bool,
    /// `COCOTB_ENABLE_PROFILING`.
    pub enable_profiling: bool,
}

impl Config {
    /// Builds a fresh, seeded RNG from [`Config::random_seed`].
    ///
    /// Cocotb testbenches log and reuse this seed so a failing run can
    /// be reproduced exactly; handing out a seeded `StdRng` rather than
    /// reaching for thread-local randomness keeps that property for any
    /// downstream task code that needs randomized stimulus.
    pub fn rng(&self) -> rand::rngs::StdRng {
        use rand::SeedableRng;
        rand::rngs::StdRng::seed_from_u64(self.random_seed)
    }

    /// Reads configuration from the process environment and `plusargs`
    /// (the simulator's argv tail, tokens of the form `+key=value` or bare `+flag`).
    pub fn from_env(plusargs: &[String]) -> Self {
        let plusargs = parse_plusargs(plusargs);

        Self {
            toplevel: env::var("COCOTB_TOPLEVEL").ok().map(|v| strip_library_prefix(&v)),
            random_seed: random_seed(&plusargs),
            user_coverage: env_bool("COCOTB_USER_COVERAGE").or_else(|| env_bool("COVERAGE")).unwrap_or(false),
            coverage_rcfile: env::var("COCOTB_COVERAGE_RCFILE")
                .ok()
                .or_else(|| env::var("COVERAGE_RCFILE").ok()),
            pdb_on_exception: env_bool("COCOTB_PDB_ON_EXCEPTION").unwrap_or(false),
            scheduler_debug: env::var("COCOTB_SCHEDULER_DEBUG").is_ok(),
            enable_profiling: env::var("COCOTB_ENABLE_PROFILING").is_ok(),
        }
    }
}

fn strip_library_prefix(v: &str) -> String {
    match v.split_once('.') {
        Some((_library, rest)) => rest.to_string(),
        None => v.to_string(),
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env::var(key).ok().map(|v| !v.is_empty() && v != "0")
}

fn random_seed(plusargs: &HashMap<String, PlusArgValue>) -> u64 {
    if let Ok(v) = env::var("COCOTB_RANDOM_SEED") {
        if let Ok(n) = v.parse() {
            return n;
        }
    }
    if let Ok(v) = env::var("RANDOM_SEED") {
        tracing::warn!("RANDOM_SEED is deprecated, use COCOTB_RANDOM_SEED instead");
        if let Ok(n) = v.parse() {
            return n;
        }
    }
    for key in ["ntb_random_seed", "seed"] {
        if let Some(PlusArgValue::Value(v)) = plusargs.get(key) {
            if let Ok(n) = v.parse() {
                return n;
            }
        }
    }
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// A simulator plusarg's value: a bare flag, or an explicit `key=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlusArgValue {
    /// A bare `+flag` with no `=value`.
    Flag,
    /// An explicit `+key=value`.
    Value(String),
}

/// Parses the simulator's plusargs (command-line tokens beginning with
/// `+`) into a key/value table.
pub fn parse_plusargs(argv: &[String]) -> HashMap<String, PlusArgValue> {
    let mut out = HashMap::new();
    for arg in argv {
        let Some(rest) = arg.strip_prefix('+') else {
            continue;
        };
        match rest.split_once('=') {
            Some((key, value)) => {
                out.insert(key.to_string(), PlusArgValue::Value(value.to_string()));
            }
            None => {
                out.insert(rest.to_string(), PlusArgValue::Flag);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plusargs() {
        let argv = vec!["+ntb_random_seed=42".to_string(), "+verbose".to_string(), "-ignored".to_string()];
        let parsed = parse_plusargs(&argv);
        assert_eq!(parsed.get("ntb_random_seed"), Some(&PlusArgValue::Value("42".into())));
        assert_eq!(parsed.get("verbose"), Some(&PlusArgValue::Flag));
        assert_eq!(parsed.get("-ignored"), None);
    }

    #[test]
    fn strips_library_prefix_from_toplevel() {
        assert_eq!(strip_library_prefix("work.my_tb"), "my_tb");
        assert_eq!(strip_library_prefix("my_tb"), "my_tb");
    }
}

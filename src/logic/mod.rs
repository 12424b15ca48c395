//! The evolvable extraction logic and the loop that keeps it honest.
//!
//! The logic unit is a Rhai script defining a single function
//! `describe(path)` that returns an object map. Everything here treats that
//! script as data: the store persists it, the executor compiles and runs a
//! fresh copy per call, the gate decides whether a synthesized replacement
//! may stay, and the controller repairs it when it breaks.

pub mod controller;
pub mod executor;
pub mod gate;
pub mod store;

use std::fmt;

/// Name of the function every version of the script must define.
pub const ENTRY_POINT: &str = "describe";

/// The logic the store falls back to: return the subject path, nothing else.
pub const DEFAULT_LOGIC: &str = r#"// Baseline extraction logic. Replacements must keep this shape: a single
// function `describe(path)` returning an object map with a `path` key.
fn describe(path) {
    #{ path: path }
}
"#;

/// An execution result: attribute name -> value, insertion-ordered.
pub type Attrs = serde_json::Map<String, serde_json::Value>;

/// A captured execution failure: what kind of error, what it said, and the
/// script source at the time it failed (for the synthesizer to diagnose).
#[derive(Debug, Clone)]
pub struct Failure {
    pub kind: String,
    pub message: String,
    pub logic_source: String,
}

impl Failure {
    pub fn new(
        kind: impl Into<String>,
        message: impl Into<String>,
        logic_source: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            logic_source: logic_source.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Failure {}

//! File-based ignore filtering.
//!
//! Test files and generated code also get analyzed by dynamic tooling
//! and do not run in production; procedures defined in matching files
//! are skipped by both the propagation and diagnosis drivers.

use nilguard_ir::ir::Procedure;
use regex::Regex;

pub const DEFAULT_IGNORE_PATTERN: &str = r".*_test\.go|zz_generated.*";

#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    pattern: Regex,
}

impl Default for IgnoreMatcher {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_IGNORE_PATTERN).expect("default ignore pattern is valid"),
        }
    }
}

impl IgnoreMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    /// True when the procedure's defining file matches the pattern.
    /// Procedures without a position are never ignored.
    pub fn is_ignored(&self, proc: &Procedure) -> bool {
        proc.span
            .as_ref()
            .is_some_and(|s| self.pattern.is_match(&s.file))
    }
}

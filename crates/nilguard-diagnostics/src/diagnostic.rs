//! Core diagnostic types.
//!
//! The analysis passes produce `Diagnostic` values; the formatters
//! (human, JSON) consume them.

use serde::{Deserialize, Serialize};

/// A diagnostic produced by the analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Diagnostic category.
    pub category: Category,
    /// One-line message, e.g. "nil dereference in field selection".
    pub message: String,
    /// Where the issue manifests.
    pub location: Location,
    /// Qualified name of the enclosing procedure.
    pub procedure: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.location, self.category, self.message)
    }
}

/// Diagnostic category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// An operation whose operand may be nil when dereferenced.
    NilDeref,
    /// A nil comparison whose outcome is statically determined.
    Cond,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilDeref => write!(f, "nilderef"),
            Self::Cond => write!(f, "cond"),
        }
    }
}

/// Source code location. Lines and columns are 1-based; `0:0` marks an
/// instruction the bridge delivered without a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    pub fn unknown() -> Self {
        Self::new("unknown", 0, 0)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_diag() -> Diagnostic {
        Diagnostic {
            category: Category::NilDeref,
            message: "nil dereference in load".into(),
            location: Location::new("main.go", 18, 5),
            procedure: "pkg.Load".into(),
        }
    }

    #[test]
    fn test_display() {
        let diag = make_diag();
        assert_eq!(
            diag.to_string(),
            "main.go:18:5: nilderef: nil dereference in load"
        );
    }

    #[test]
    fn test_category_display() {
        assert_eq!(Category::NilDeref.to_string(), "nilderef");
        assert_eq!(Category::Cond.to_string(), "cond");
    }

    #[test]
    fn test_json_roundtrip() {
        let diag = make_diag();
        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"nilderef\""));
        let parsed: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, diag);
    }

    #[test]
    fn test_unknown_location() {
        let loc = Location::unknown();
        assert_eq!(loc.to_string(), "unknown:0:0");
    }
}

//! Source positions.

use serde::{Deserialize, Serialize};

/// A position in source text.
///
/// Line `0` means the position is unknown (nodes built programmatically).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos {
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl Pos {
    /// Create a new position.
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Whether this position points at real source text.
    pub fn is_known(&self) -> bool {
        self.line != 0
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_known() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            f.write_str("<unknown>")
        }
    }
}

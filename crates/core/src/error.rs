//! Error taxonomy for evaluation.
//!
//! Two families are kept structurally apart:
//!
//! - [`EvalError`]: a typed, recoverable failure of a single node (or an
//!   aggregate of several concurrent failures).
//! - [`InternalError`]: a broken invariant of the analysis or scheduling
//!   machinery. It travels inside [`EvalError::Internal`] so it can cross
//!   nested evaluation, but it is never aggregated or retried and the
//!   top-level driver treats it as fatal.

use crate::Pos;

/// Result type for node evaluation.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Invariant violations of the dependency analysis and the scheduler.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InternalError {
    /// A node read a name that no writer (outer or in-sequence) was tracked for
    #[error("node {index} uses `{name}` which has no tracked writer")]
    UntrackedName {
        /// Name that was read
        name: String,
        /// Index of the reading node
        index: usize,
    },

    /// The dependency map referenced a node that has no strand yet
    #[error("node {index} depends on node {dependency} which has no strand")]
    UnknownDependency {
        /// Index of the dependent node
        index: usize,
        /// Index of the missing dependency
        dependency: usize,
    },

    /// The strand partition does not own every node exactly once
    #[error("strand partition check failed: unassigned {unassigned:?}, duplicated {duplicated:?}")]
    StrandPartition {
        /// Node indices owned by no strand
        unassigned: Vec<usize>,
        /// Node indices owned more than once
        duplicated: Vec<usize>,
    },

    /// A strand's dependency counter was released more often than it had dependencies
    #[error("dependency counter of strand {strand} released below zero")]
    CounterUnderflow {
        /// Strand index
        strand: usize,
    },

    /// An outcome arrived for a node index outside the sequence
    #[error("outcome reported for node {index} of a {expected}-node sequence")]
    UnknownNode {
        /// Reported index
        index: usize,
        /// Number of nodes in the sequence
        expected: usize,
    },

    /// The result channel closed before every node reported
    #[error("result channel closed after {received} of {expected} results")]
    ResultsLost {
        /// Results received
        received: usize,
        /// Results expected
        expected: usize,
    },
}

/// Errors produced while evaluating nodes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// Names read before anything defined them
    #[error("{pos}: required variables not defined: {}", .names.join(", "))]
    Undefined {
        /// Missing names
        names: Vec<String>,
        /// Position of the reading node
        pos: Pos,
    },

    /// Reassignment of a name that is not visible
    #[error("{pos}: cannot modify undefined variable `{name}`")]
    NotModifiable {
        /// Name being reassigned
        name: String,
        /// Position of the reassignment
        pos: Pos,
    },

    /// Operand of the wrong type
    #[error("{pos}: {op}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Operation name
        op: String,
        /// Expected type
        expected: &'static str,
        /// Actual type
        found: &'static str,
        /// Position of the call
        pos: Pos,
    },

    /// Wrong number of arguments
    #[error("{pos}: {op}: expected {expected} argument(s), found {found}")]
    Arity {
        /// Operation name
        op: String,
        /// Expected count
        expected: usize,
        /// Actual count
        found: usize,
        /// Position of the call
        pos: Pos,
    },

    /// Division by zero
    #[error("{pos}: division by zero")]
    DivisionByZero {
        /// Position of the call
        pos: Pos,
    },

    /// Call to an operation using resources its scope does not allow
    #[error("{pos}: {op}: resource(s) not allowed: {}", .resources.join(", "))]
    ResourcesDenied {
        /// Operation name
        op: String,
        /// Indices of the refused resources among the operation's resources
        indices: Vec<usize>,
        /// Refused resources, rendered
        resources: Vec<String>,
        /// Position of the call
        pos: Pos,
    },

    /// Error raised by the program itself
    #[error("{pos}: error: {message}")]
    Raised {
        /// User message
        message: String,
        /// Position of the raise
        pos: Pos,
    },

    /// Failed assertion
    #[error("{pos}: failed assertion: {message}")]
    AssertionFailed {
        /// User message
        message: String,
        /// Position of the assertion
        pos: Pos,
    },

    /// Several concurrent failures of one sequence
    #[error("{0}")]
    Multiple(MultipleErrors),

    /// Fatal invariant violation
    #[error("internal error: {0}")]
    Internal(#[from] InternalError),
}

impl EvalError {
    /// Whether this error is a non-recoverable invariant violation.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Internal(_) => true,
            Self::Multiple(m) => m.errors().iter().any(EvalError::is_fatal),
            _ => false,
        }
    }

    /// Source position of the failure, when it has a single one.
    pub fn pos(&self) -> Option<Pos> {
        match self {
            Self::Undefined { pos, .. }
            | Self::NotModifiable { pos, .. }
            | Self::TypeMismatch { pos, .. }
            | Self::Arity { pos, .. }
            | Self::DivisionByZero { pos }
            | Self::ResourcesDenied { pos, .. }
            | Self::Raised { pos, .. }
            | Self::AssertionFailed { pos, .. } => Some(*pos),
            Self::Multiple(_) | Self::Internal(_) => None,
        }
    }

    /// Fold collected failures into one error.
    ///
    /// Returns `None` for an empty list, the error itself for a single
    /// failure, and [`EvalError::Multiple`] otherwise.
    pub fn aggregate(mut errors: Vec<EvalError>) -> Option<EvalError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(MultipleErrors(errors))),
        }
    }
}

/// Two or more node failures collected from one concurrent sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipleErrors(Vec<EvalError>);

impl MultipleErrors {
    /// The constituent errors.
    pub fn errors(&self) -> &[EvalError] {
        &self.0
    }

    /// Number of constituent errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; an aggregate holds at least two errors.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for MultipleErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} errors:", self.0.len())?;
        for err in &self.0 {
            for line in err.to_string().lines() {
                write!(f, "\n\t{}", line)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_single_error_is_unchanged() {
        let err = EvalError::DivisionByZero { pos: Pos::new(1, 3) };
        assert_eq!(EvalError::aggregate(vec![err.clone()]), Some(err));
        assert_eq!(EvalError::aggregate(vec![]), None);
    }

    #[test]
    fn test_multiple_errors_lists_every_failure() {
        let err = EvalError::aggregate(vec![
            EvalError::DivisionByZero { pos: Pos::new(1, 1) },
            EvalError::Raised { message: "boom".into(), pos: Pos::new(2, 5) },
        ])
        .unwrap();

        let text = err.to_string();
        assert!(text.starts_with("2 errors:"));
        assert!(text.contains("1:1: division by zero"));
        assert!(text.contains("2:5: error: boom"));
        assert_eq!(err.pos(), None);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_internal_errors_are_fatal() {
        let err: EvalError = InternalError::CounterUnderflow { strand: 2 }.into();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("strand 2"));
    }

    #[test]
    fn test_unknown_position_renders_placeholder() {
        let err = EvalError::Undefined { names: vec!["a".into()], pos: Pos::default() };
        assert_eq!(err.to_string(), "<unknown>: required variables not defined: a");
    }
}

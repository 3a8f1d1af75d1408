//! Engine error types.
//!
//! Two classes of failure exist: fatal programmer-contract violations
//! (`Internal`, `UnregisteredKind`) which signal a bug in the surrounding
//! pipeline and must propagate uncaught, and user-data errors (`Parse`,
//! `UnknownRule`) raised against the authored rule set. Recoverable
//! conditions such as unit mismatches are logged, never returned.

use crate::node::NodeKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// An invariant owed by an upstream collaborator was violated.
    #[error("internal error: {0}")]
    Internal(String),

    /// Evaluation dispatched on a node kind with no registered evaluator.
    #[error("no evaluator registered for node kind '{0}'")]
    UnregisteredKind(NodeKind),

    /// A raw rule body does not have the shape its mechanism requires.
    #[error("malformed rule '{rule}': {message}")]
    Parse { rule: String, message: String },

    /// A top-level query named a rule absent from the rule set.
    #[error("rule '{0}' does not exist")]
    UnknownRule(String),
}

/// Result alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

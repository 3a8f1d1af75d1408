//! The regle evaluation engine.
//!
//! Rules encode interdependent legal and fiscal computations as a graph of
//! named formulas. Evaluating any rule yields a concrete value together with
//! the "missing variables" still required to decide it, so a host can ask
//! exactly the right follow-up questions.
//!
//! The engine consumes already-structured rule bodies (a [`serde_json::Value`]
//! tree) whose references are already fully qualified; tokenizing authored
//! expressions and resolving short names both happen upstream.

pub mod coerce;
pub mod context;
pub mod mechanisms;
pub mod parse;
pub mod replacement;
pub mod rule;

mod engine;

pub use context::{EvalContext, EvalFn, Logger, Registry, TracingLogger};
pub use engine::Engine;
pub use parse::{parse, ParseContext};
pub use regle_types::{
    format_value, parse_unit, serialize_unit, Bracket, Branch, EngineError, EngineResult,
    Evaluated, MissingVariables, Node, NodeKind, NodeValue, Operator, ReplacementRule, RuleData,
    TextPart, Unit,
};

//! Shared types for the regle engine.
//!
//! This crate defines the node types of the rule language, evaluated values
//! and units, missing-variable bookkeeping, and the error types used across
//! the engine.

mod error;
mod missing;
mod unit;
mod value;
pub mod node;

pub use error::{EngineError, EngineResult};
pub use missing::MissingVariables;
pub use node::{Bracket, Branch, Node, NodeKind, Operator, ReplacementRule, RuleData, TextPart};
pub use unit::{convert_to_unit, infer_unit, parse_unit, serialize_unit, Unit, UnitConversionError};
pub use value::{format_value, Evaluated, NodeValue};

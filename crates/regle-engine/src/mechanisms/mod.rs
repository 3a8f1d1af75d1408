//! The computation mechanisms: each node kind's parse and evaluate behavior.

pub mod aggregate;
pub mod operation;
pub mod possibility;
pub mod progressive;
pub mod recalcul;
pub mod text;
pub mod variations;

use crate::context::{EvalContext, Registry};
use regle_types::{EngineError, EngineResult, Evaluated, Node, NodeKind};

/// Register every mechanism evaluator into a fresh registry.
pub fn register_all(registry: &mut Registry) {
    registry.register(NodeKind::Constant, evaluate_constant);
    registry.register(NodeKind::Operation, operation::evaluate);
    registry.register(NodeKind::Sum, aggregate::evaluate_sum);
    registry.register(NodeKind::AllOf, aggregate::evaluate_all_of);
    registry.register(NodeKind::AnyOf, aggregate::evaluate_any_of);
    registry.register(NodeKind::Variations, variations::evaluate);
    registry.register(NodeKind::ProgressiveRate, progressive::evaluate);
    registry.register(NodeKind::OnePossibility, possibility::evaluate);
    registry.register(NodeKind::Text, text::evaluate);
    registry.register(NodeKind::Recalcul, recalcul::evaluate);
}

fn evaluate_constant(node: &Node, _ctx: &mut EvalContext) -> EngineResult<Evaluated> {
    let Node::Constant { value, unit } = node else {
        return Err(EngineError::Internal("constant evaluator got another kind".into()));
    };
    Ok(Evaluated {
        value: value.clone(),
        unit: unit.clone(),
        missing_variables: Default::default(),
    })
}

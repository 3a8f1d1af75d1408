//! Condition→consequence alternatives, first decided match wins.
//!
//! Used both for the authored `variations` mechanism and as the node the
//! replacement inliner substitutes for overridden references.

use crate::context::EvalContext;
use crate::parse::ParseContext;
use regle_types::{
    Branch, EngineError, EngineResult, Evaluated, MissingVariables, Node, NodeValue,
};
use serde_json::Value;
use std::rc::Rc;

pub fn parse(body: &Value, ctx: &ParseContext) -> EngineResult<Rc<Node>> {
    let items = body
        .as_array()
        .ok_or_else(|| ctx.error("'variations' expects a list of branches"))?;
    let mut branches = Vec::with_capacity(items.len());
    for item in items {
        let map = item
            .as_object()
            .ok_or_else(|| ctx.error("a variation is an object"))?;
        let branch = if let Some(fallback) = map.get("sinon") {
            Branch {
                condition: Rc::new(Node::constant(NodeValue::Bool(true))),
                consequence: crate::parse::parse(fallback, ctx)?,
            }
        } else {
            let condition = map
                .get("si")
                .ok_or_else(|| ctx.error("a variation needs 'si' or 'sinon'"))?;
            let consequence = map
                .get("alors")
                .ok_or_else(|| ctx.error("a variation with 'si' needs 'alors'"))?;
            Branch {
                condition: crate::parse::parse(condition, ctx)?,
                consequence: crate::parse::parse(consequence, ctx)?,
            }
        };
        branches.push(branch);
    }
    Ok(Rc::new(Node::Variations { branches }))
}

/// Evaluate branches left to right. A decidedly-false condition skips its
/// consequence entirely; an undecided condition keeps both its own and its
/// consequence's missing variables alive and forces the overall value
/// unknown, since a later decided branch can no longer be known to apply.
pub fn evaluate(node: &Node, ctx: &mut EvalContext) -> EngineResult<Evaluated> {
    let Node::Variations { branches } = node else {
        return Err(EngineError::Internal("variations evaluator got another kind".into()));
    };
    let mut missing = MissingVariables::new();
    let mut undecided = false;
    for branch in branches {
        let condition = ctx.evaluate(&branch.condition)?;
        missing.merge(&condition.missing_variables);
        match condition.value.truth() {
            Some(false) => {}
            Some(true) => {
                let consequence = ctx.evaluate(&branch.consequence)?;
                missing.merge(&consequence.missing_variables);
                return Ok(if undecided {
                    Evaluated::unknown(missing)
                } else {
                    Evaluated {
                        value: consequence.value,
                        unit: consequence.unit,
                        missing_variables: missing,
                    }
                });
            }
            None => {
                let consequence = ctx.evaluate(&branch.consequence)?;
                missing.merge(&consequence.missing_variables);
                undecided = true;
            }
        }
    }
    Ok(Evaluated {
        value: if undecided {
            NodeValue::Unknown
        } else {
            NodeValue::Null
        },
        unit: None,
        missing_variables: missing,
    })
}

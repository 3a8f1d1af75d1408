//! Sums and boolean combinators.
//!
//! The combinators evaluate left to right and short-circuit on the first
//! decisive condition: conditions never reached contribute nothing to the
//! missing-variable set, while every condition actually evaluated merges
//! its own set even when decided (a decision may rest on defaulted answers).

use crate::coerce::as_arith;
use crate::context::EvalContext;
use crate::parse::{parse, ParseContext};
use regle_types::{
    convert_to_unit, EngineError, EngineResult, Evaluated, MissingVariables, Node, NodeValue, Unit,
};
use serde_json::Value;
use std::rc::Rc;

fn parse_items(body: &Value, ctx: &ParseContext, mechanism: &str) -> EngineResult<Vec<Rc<Node>>> {
    body.as_array()
        .ok_or_else(|| ctx.error(format!("'{mechanism}' expects a list")))?
        .iter()
        .map(|item| parse(item, ctx))
        .collect()
}

pub fn parse_sum(body: &Value, ctx: &ParseContext) -> EngineResult<Rc<Node>> {
    Ok(Rc::new(Node::Sum {
        terms: parse_items(body, ctx, "somme")?,
    }))
}

pub fn parse_all_of(body: &Value, ctx: &ParseContext) -> EngineResult<Rc<Node>> {
    Ok(Rc::new(Node::AllOf {
        conditions: parse_items(body, ctx, "toutes ces conditions")?,
    }))
}

pub fn parse_any_of(body: &Value, ctx: &ParseContext) -> EngineResult<Rc<Node>> {
    Ok(Rc::new(Node::AnyOf {
        conditions: parse_items(body, ctx, "une de ces conditions")?,
    }))
}

/// Sum every term. Null terms count as 0; any unknown term makes the whole
/// sum unknown. All terms contribute their missing variables.
pub fn evaluate_sum(node: &Node, ctx: &mut EvalContext) -> EngineResult<Evaluated> {
    let Node::Sum { terms } = node else {
        return Err(EngineError::Internal("sum evaluator got another kind".into()));
    };
    let mut missing = MissingVariables::new();
    let mut total = 0.0;
    let mut unknown = false;
    let mut unit: Option<Unit> = None;
    for term in terms {
        let evaluated = ctx.evaluate(term)?;
        missing.merge(&evaluated.missing_variables);
        if evaluated.value.is_unknown() {
            unknown = true;
            continue;
        }
        let evaluated = if let Some(target) = unit.clone() {
            match convert_to_unit(&evaluated, &target) {
                Ok(converted) => converted,
                Err(err) => {
                    ctx.logger()
                        .warn(&format!("in 'somme': {err}; proceeding with raw magnitudes"));
                    evaluated
                }
            }
        } else {
            unit = evaluated.unit.clone();
            evaluated
        };
        if let Some(n) = as_arith(&evaluated.value) {
            total += n;
        }
    }
    Ok(Evaluated {
        value: if unknown {
            NodeValue::Unknown
        } else {
            NodeValue::Number(total)
        },
        unit,
        missing_variables: missing,
    })
}

pub fn evaluate_any_of(node: &Node, ctx: &mut EvalContext) -> EngineResult<Evaluated> {
    let Node::AnyOf { conditions } = node else {
        return Err(EngineError::Internal("any-of evaluator got another kind".into()));
    };
    evaluate_combinator(conditions, ctx, true)
}

pub fn evaluate_all_of(node: &Node, ctx: &mut EvalContext) -> EngineResult<Evaluated> {
    let Node::AllOf { conditions } = node else {
        return Err(EngineError::Internal("all-of evaluator got another kind".into()));
    };
    evaluate_combinator(conditions, ctx, false)
}

/// Shared combinator loop. `decisive` is the truth value that settles the
/// outcome: true for a disjunction, false for a conjunction.
fn evaluate_combinator(
    conditions: &[Rc<Node>],
    ctx: &mut EvalContext,
    decisive: bool,
) -> EngineResult<Evaluated> {
    let mut missing = MissingVariables::new();
    let mut undecided = false;
    for condition in conditions {
        let evaluated = ctx.evaluate(condition)?;
        missing.merge(&evaluated.missing_variables);
        match evaluated.value.truth() {
            Some(decision) if decision == decisive => {
                return Ok(Evaluated {
                    value: NodeValue::Bool(decisive),
                    unit: None,
                    missing_variables: missing,
                });
            }
            Some(_) => {}
            None => undecided = true,
        }
    }
    Ok(Evaluated {
        value: if undecided {
            NodeValue::Unknown
        } else {
            NodeValue::Bool(!decisive)
        },
        unit: None,
        missing_variables: missing,
    })
}

//! Re-evaluation of a rule under an amended situation.

use crate::context::EvalContext;
use crate::parse::ParseContext;
use regle_types::{EngineError, EngineResult, Evaluated, MissingVariables, Node};
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// `{ "règle": name, "avec": { name: expr, … } }`. The target defaults to
/// the enclosing rule; amendment keys are references selecting the rules
/// being answered.
pub fn parse(body: &Value, ctx: &ParseContext) -> EngineResult<Rc<Node>> {
    let map = body
        .as_object()
        .ok_or_else(|| ctx.error("'recalcul' expects an object"))?;
    let target = match map.get("règle") {
        Some(raw) => Some(crate::parse::parse(raw, ctx)?),
        None => None,
    };
    let mut amendments = Vec::new();
    if let Some(with) = map.get("avec") {
        let entries = with
            .as_object()
            .ok_or_else(|| ctx.error("'avec' expects an object of answers"))?;
        for (name, raw) in entries {
            let key = Rc::new(Node::Reference {
                name: name.trim().to_string(),
                context: ctx.dotted_name.clone(),
            });
            amendments.push((key, crate::parse::parse(raw, ctx)?));
        }
    }
    Ok(Rc::new(Node::Recalcul {
        target,
        amendments,
        context: ctx.dotted_name.clone(),
    }))
}

pub fn evaluate(node: &Node, ctx: &mut EvalContext) -> EngineResult<Evaluated> {
    let Node::Recalcul { target, amendments, context } = node else {
        return Err(EngineError::Internal("recalcul evaluator got another kind".into()));
    };
    let mut missing = MissingVariables::new();
    let mut overlay = HashMap::new();
    for (key, value) in amendments {
        let Node::Reference { name, .. } = key.as_ref() else {
            return Err(EngineError::Internal(
                "recalcul amendment key is not a reference".into(),
            ));
        };
        let evaluated = ctx.evaluate(value)?;
        missing.merge(&evaluated.missing_variables);
        overlay.insert(
            name.clone(),
            Rc::new(Node::Constant {
                value: evaluated.value,
                unit: evaluated.unit,
            }),
        );
    }
    let target = match target {
        Some(node) => Rc::clone(node),
        None => Rc::new(Node::Reference {
            name: context.clone(),
            context: context.clone(),
        }),
    };
    ctx.push_overlay(overlay);
    let result = ctx.evaluate(&target);
    ctx.pop_overlay();
    let evaluated = result?;
    missing.merge(&evaluated.missing_variables);
    Ok(Evaluated {
        value: evaluated.value,
        unit: evaluated.unit,
        missing_variables: missing,
    })
}

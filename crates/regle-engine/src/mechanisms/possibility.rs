//! Forced choice among an enumerated set of possibilities.

use crate::context::EvalContext;
use crate::parse::ParseContext;
use regle_types::{EngineError, EngineResult, Evaluated, MissingVariables, Node, NodeValue};
use serde_json::Value;
use std::rc::Rc;

/// Accepts either a bare list of possibility names or an object carrying a
/// `possibilités` list and an optional `choix obligatoire` flag.
pub fn parse(body: &Value, ctx: &ParseContext) -> EngineResult<Rc<Node>> {
    let (items, mandatory) = match body {
        Value::Array(items) => (items, false),
        Value::Object(map) => {
            let items = map
                .get("possibilités")
                .and_then(Value::as_array)
                .ok_or_else(|| ctx.error("'une possibilité' needs a 'possibilités' list"))?;
            let mandatory = matches!(
                map.get("choix obligatoire").and_then(Value::as_str),
                Some("oui")
            );
            (items, mandatory)
        }
        _ => return Err(ctx.error("'une possibilité' expects a list or an object")),
    };
    let possibilities = items
        .iter()
        .map(|item| crate::parse::parse(item, ctx))
        .collect::<EngineResult<Vec<_>>>()?;
    Ok(Rc::new(Node::OnePossibility {
        possibilities,
        mandatory,
        context: ctx.dotted_name.clone(),
    }))
}

/// Deliberately degenerate: whatever the possibilities are, the rule's
/// answer has to come from outside, so the node is unknown and demands the
/// enclosing rule itself. Inapplicability and already-supplied answers are
/// handled by the rule layer, not here.
pub fn evaluate(node: &Node, _ctx: &mut EvalContext) -> EngineResult<Evaluated> {
    let Node::OnePossibility { context, .. } = node else {
        return Err(EngineError::Internal("possibility evaluator got another kind".into()));
    };
    Ok(Evaluated {
        value: NodeValue::Unknown,
        unit: None,
        missing_variables: MissingVariables::of(context.clone()),
    })
}

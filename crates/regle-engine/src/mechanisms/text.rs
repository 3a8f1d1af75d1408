//! Interpolated text: literal spans alternating with `{{ expression }}`.

use crate::context::EvalContext;
use crate::parse::ParseContext;
use regle_types::{
    format_value, EngineError, EngineResult, Evaluated, MissingVariables, Node, NodeValue,
    TextPart,
};
use serde_json::Value;
use std::rc::Rc;

pub fn parse(body: &Value, ctx: &ParseContext) -> EngineResult<Rc<Node>> {
    let template = body
        .as_str()
        .ok_or_else(|| ctx.error("'texte' expects a string"))?;
    let mut parts = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let Some(end) = rest[start..].find("}}").map(|i| start + i) else {
            break;
        };
        if start > 0 {
            parts.push(TextPart::Literal(rest[..start].to_string()));
        }
        let expression = rest[start + 2..end].trim();
        let node = crate::parse::parse(&Value::String(expression.to_string()), ctx)?;
        parts.push(TextPart::Expr(node));
        rest = &rest[end + 2..];
    }
    if !rest.is_empty() {
        parts.push(TextPart::Literal(rest.to_string()));
    }
    Ok(Rc::new(Node::Text { parts }))
}

/// Evaluate every embedded expression, merge their missing variables, and
/// concatenate literals with formatted values.
pub fn evaluate(node: &Node, ctx: &mut EvalContext) -> EngineResult<Evaluated> {
    let Node::Text { parts } = node else {
        return Err(EngineError::Internal("text evaluator got another kind".into()));
    };
    let mut missing = MissingVariables::new();
    let mut output = String::new();
    for part in parts {
        match part {
            TextPart::Literal(text) => output.push_str(text),
            TextPart::Expr(expression) => {
                let evaluated = ctx.evaluate(expression)?;
                missing.merge(&evaluated.missing_variables);
                output.push_str(&format_value(&evaluated.value, evaluated.unit.as_ref()));
            }
        }
    }
    Ok(Evaluated {
        value: NodeValue::Str(output),
        unit: None,
        missing_variables: missing,
    })
}

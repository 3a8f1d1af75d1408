//! The parse step: raw structured rule bodies into typed nodes.
//!
//! Authored rules are stored as YAML/JSON objects; by the time they reach
//! the engine they are a [`serde_json::Value`] tree and every reference is
//! fully qualified. Each mechanism normalizes its own body shape, recursing
//! through [`parse`] for sub-expressions.

use crate::coerce::looks_like_date;
use crate::mechanisms::{aggregate, operation, possibility, progressive, recalcul, text, variations};
use regle_types::{parse_unit, EngineError, EngineResult, Node, NodeValue, Operator};
use serde_json::Value;
use std::rc::Rc;

/// Parse-time context: the fully-qualified name of the rule whose body is
/// being parsed. References keep it as their enclosing namespace.
#[derive(Debug, Clone)]
pub struct ParseContext {
    pub dotted_name: String,
}

impl ParseContext {
    pub fn new(dotted_name: impl Into<String>) -> Self {
        Self {
            dotted_name: dotted_name.into(),
        }
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> EngineError {
        EngineError::Parse {
            rule: self.dotted_name.clone(),
            message: message.into(),
        }
    }
}

/// Parse a raw expression into a typed node.
pub fn parse(raw: &Value, ctx: &ParseContext) -> EngineResult<Rc<Node>> {
    match raw {
        Value::Null => Ok(Rc::new(Node::constant(NodeValue::Null))),
        Value::Bool(b) => Ok(Rc::new(Node::constant(NodeValue::Bool(*b)))),
        Value::Number(n) => {
            let n = n
                .as_f64()
                .ok_or_else(|| ctx.error("number out of range"))?;
            Ok(Rc::new(Node::constant(NodeValue::Number(n))))
        }
        Value::String(s) => parse_scalar_text(s, ctx),
        Value::Object(map) => {
            let mut keys = map.keys();
            let key = keys
                .next()
                .ok_or_else(|| ctx.error("empty mechanism object"))?;
            if keys.next().is_some() {
                return Err(ctx.error("expected a single mechanism key"));
            }
            parse_mechanism(key, &map[key.as_str()], ctx)
        }
        Value::Array(_) => Err(ctx.error("a bare list is not an expression")),
    }
}

/// Dispatch a mechanism key to its parse function.
pub(crate) fn parse_mechanism(key: &str, body: &Value, ctx: &ParseContext) -> EngineResult<Rc<Node>> {
    match key {
        "somme" => aggregate::parse_sum(body, ctx),
        "toutes ces conditions" => aggregate::parse_all_of(body, ctx),
        "une de ces conditions" => aggregate::parse_any_of(body, ctx),
        "variations" => variations::parse(body, ctx),
        "taux progressif" => progressive::parse(body, ctx),
        "une possibilité" => possibility::parse(body, ctx),
        "texte" => text::parse(body, ctx),
        "recalcul" => recalcul::parse(body, ctx),
        "valeur" | "formule" => parse(body, ctx),
        _ => match Operator::from_key(key) {
            Some(op) => operation::parse(op, body, ctx),
            None => Err(ctx.error(format!("unknown mechanism '{key}'"))),
        },
    }
}

/// Classify a scalar string: `oui`/`non` booleans, `'quoted'` string
/// literals, `DD/MM/YYYY` date literals, numbers with an optional unit,
/// and otherwise a fully-qualified reference.
fn parse_scalar_text(text: &str, ctx: &ParseContext) -> EngineResult<Rc<Node>> {
    let trimmed = text.trim();
    match trimmed {
        "oui" => return Ok(Rc::new(Node::constant(NodeValue::Bool(true)))),
        "non" => return Ok(Rc::new(Node::constant(NodeValue::Bool(false)))),
        _ => {}
    }
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        let inner = &trimmed[1..trimmed.len() - 1];
        return Ok(Rc::new(Node::constant(NodeValue::Str(inner.to_string()))));
    }
    if looks_like_date(trimmed) {
        return Ok(Rc::new(Node::constant(NodeValue::Str(trimmed.to_string()))));
    }
    if let Some(node) = parse_number_literal(trimmed) {
        return Ok(node);
    }
    if trimmed.is_empty() {
        return Err(ctx.error("empty expression"));
    }
    Ok(Rc::new(Node::Reference {
        name: trimmed.to_string(),
        context: ctx.dotted_name.clone(),
    }))
}

fn parse_number_literal(text: &str) -> Option<Rc<Node>> {
    if let Ok(n) = text.parse::<f64>() {
        return Some(Rc::new(Node::constant(NodeValue::Number(n))));
    }
    let split = text.find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))?;
    if split == 0 {
        return None;
    }
    let (magnitude, unit_text) = text.split_at(split);
    let n = magnitude.parse::<f64>().ok()?;
    let unit_text = unit_text.trim();
    if unit_text.is_empty() {
        return None;
    }
    Some(Rc::new(Node::Constant {
        value: NodeValue::Number(n),
        unit: Some(parse_unit(unit_text)),
    }))
}

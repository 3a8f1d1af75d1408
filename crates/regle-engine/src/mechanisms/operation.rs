//! Binary operators with unit alignment and date-aware comparison.

use crate::coerce::{as_arith, eq_coerced, looks_like_date, parse_date};
use crate::context::EvalContext;
use crate::parse::ParseContext;
use regle_types::{
    convert_to_unit, infer_unit, EngineError, EngineResult, Evaluated, Node, NodeValue, Operator,
};
use serde_json::Value;
use std::rc::Rc;

pub fn parse(operator: Operator, body: &Value, ctx: &ParseContext) -> EngineResult<Rc<Node>> {
    let operands = body
        .as_array()
        .filter(|items| items.len() == 2)
        .ok_or_else(|| ctx.error(format!("'{}' expects two operands", operator.key())))?;
    Ok(Rc::new(Node::Operation {
        operator,
        left: crate::parse::parse(&operands[0], ctx)?,
        right: crate::parse::parse(&operands[1], ctx)?,
    }))
}

pub fn evaluate(node: &Node, ctx: &mut EvalContext) -> EngineResult<Evaluated> {
    let Node::Operation { operator, left, right } = node else {
        return Err(EngineError::Internal("operation evaluator got another kind".into()));
    };
    let operator = *operator;
    let mut a = ctx.evaluate(left)?;
    let mut b = ctx.evaluate(right)?;

    // Both operands always contribute, even when one is already unknown.
    let mut missing = a.missing_variables.clone();
    missing.merge(&b.missing_variables);

    if a.value.is_unknown() || b.value.is_unknown() {
        return Ok(Evaluated::unknown(missing));
    }

    // Multiplication and division compose units; every other operator
    // aligns the operands on a common unit first. An impossible conversion
    // is recoverable: warn and keep the raw magnitudes.
    if !operator.is_multiplicative() {
        let aligned = if let Some(unit) = a.unit.clone() {
            convert_to_unit(&b, &unit).map(|converted| b = converted)
        } else if let Some(unit) = b.unit.clone() {
            convert_to_unit(&a, &unit).map(|converted| a = converted)
        } else {
            Ok(())
        };
        if let Err(err) = aligned {
            ctx.logger().warn(&format!(
                "in '{}': {err}; proceeding with raw magnitudes",
                operator.symbol()
            ));
        }
    }

    let value = compute(operator, &a.value, &b.value);
    let unit = if operator.is_comparison() {
        None
    } else {
        infer_unit(operator, a.unit.as_ref(), b.unit.as_ref())
    };
    Ok(Evaluated {
        value,
        unit,
        missing_variables: missing,
    })
}

fn compute(operator: Operator, a: &NodeValue, b: &NodeValue) -> NodeValue {
    use NodeValue::{Bool, Null, Number, Str};

    // Boolean or null operand: only equality and arithmetic are meaningful,
    // relational comparison is decided false.
    if matches!(a, Bool(_) | Null) || matches!(b, Bool(_) | Null) {
        return match operator {
            Operator::Eq => Bool(eq_coerced(a, b)),
            Operator::Neq => Bool(!eq_coerced(a, b)),
            Operator::Mul | Operator::Div | Operator::Add | Operator::Sub => {
                match (as_arith(a), as_arith(b)) {
                    (Some(x), Some(y)) => Number(apply_arith(operator, x, y)),
                    _ => Null,
                }
            }
            _ => Bool(false),
        };
    }

    if let (Str(x), Str(y)) = (a, b) {
        if operator.is_comparison() && looks_like_date(x) && looks_like_date(y) {
            if let (Some(dx), Some(dy)) = (parse_date(x), parse_date(y)) {
                return Bool(apply_cmp(operator, &dx, &dy));
            }
        }
        return match operator {
            Operator::Add => Str(format!("{x}{y}")),
            Operator::Sub | Operator::Mul | Operator::Div => Null,
            _ => Bool(apply_cmp(operator, x, y)),
        };
    }

    if let (Number(x), Number(y)) = (a, b) {
        return if operator.is_comparison() {
            Bool(apply_cmp(operator, x, y))
        } else {
            Number(apply_arith(operator, *x, *y))
        };
    }

    // Mixed string/number operands have no sensible outcome.
    Null
}

fn apply_arith(operator: Operator, x: f64, y: f64) -> f64 {
    match operator {
        Operator::Mul => x * y,
        Operator::Div => x / y,
        Operator::Add => x + y,
        Operator::Sub => x - y,
        _ => unreachable!("comparison handled separately"),
    }
}

fn apply_cmp<T: PartialOrd + PartialEq + ?Sized>(operator: Operator, x: &T, y: &T) -> bool {
    match operator {
        Operator::Lt => x < y,
        Operator::Lte => x <= y,
        Operator::Gt => x > y,
        Operator::Gte => x >= y,
        Operator::Eq => x == y,
        Operator::Neq => x != y,
        _ => unreachable!("arithmetic handled separately"),
    }
}

//! Progressive rate schedules: tiered brackets with linear interpolation.
//!
//! Unlike a step schedule, the rate ramps smoothly across a tier: an interior
//! active bracket interpolates between the previous tier's rate and its own,
//! proportional to the base amount's position inside the bracket.

use crate::context::EvalContext;
use crate::parse::ParseContext;
use regle_types::{
    convert_to_unit, Bracket, EngineError, EngineResult, Evaluated, MissingVariables, Node,
    NodeValue, Unit,
};
use serde_json::Value;
use std::rc::Rc;

pub fn parse(body: &Value, ctx: &ParseContext) -> EngineResult<Rc<Node>> {
    let map = body
        .as_object()
        .ok_or_else(|| ctx.error("'taux progressif' expects an object"))?;
    let base = map
        .get("assiette")
        .ok_or_else(|| ctx.error("'taux progressif' needs an 'assiette'"))?;
    let multiplier = match map.get("multiplicateur") {
        Some(raw) => crate::parse::parse(raw, ctx)?,
        None => Rc::new(Node::constant(NodeValue::Number(1.0))),
    };
    let raw_brackets = map
        .get("tranches")
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
        .ok_or_else(|| ctx.error("'taux progressif' needs a non-empty 'tranches' list"))?;

    // The floor of a tier defaults to the previous tier's ceiling.
    let mut brackets = Vec::with_capacity(raw_brackets.len());
    let mut previous_ceiling: Option<Rc<Node>> = None;
    for raw in raw_brackets {
        let tier = raw
            .as_object()
            .ok_or_else(|| ctx.error("a 'tranche' is an object"))?;
        let rate = tier
            .get("taux")
            .ok_or_else(|| ctx.error("a 'tranche' needs a 'taux'"))?;
        let floor = match tier.get("plancher") {
            Some(raw) => crate::parse::parse(raw, ctx)?,
            None => previous_ceiling
                .clone()
                .unwrap_or_else(|| Rc::new(Node::constant(NodeValue::Number(0.0)))),
        };
        let ceiling = match tier.get("plafond") {
            Some(raw) => Some(crate::parse::parse(raw, ctx)?),
            None => None,
        };
        previous_ceiling = ceiling.clone();
        brackets.push(Bracket {
            floor,
            ceiling,
            rate: crate::parse::parse(rate, ctx)?,
        });
    }
    Ok(Rc::new(Node::ProgressiveRate {
        base: crate::parse::parse(base, ctx)?,
        multiplier,
        brackets,
    }))
}

/// One tier after activation, freshly constructed per evaluation. Bounds are
/// scaled by the multiplier; `None` means the bound is not yet computable.
struct EvaluatedBracket {
    floor: Option<f64>,
    ceiling: Option<f64>,
    is_active: Option<bool>,
    missing: MissingVariables,
}

/// Compute activation bracket by bracket, lazily: once an active tier is
/// found, the remaining tiers are decidedly inactive and stay unevaluated.
/// When a tier's activation cannot be decided, its rate is evaluated too so
/// its missing variables stay visible.
fn evaluate_brackets(
    brackets: &[Bracket],
    base: &Evaluated,
    multiplier: &Evaluated,
    ctx: &mut EvalContext,
) -> EngineResult<Vec<EvaluatedBracket>> {
    let base_amount = base.value.as_number();
    let scale = multiplier.value.as_number();
    let mut evaluated = Vec::with_capacity(brackets.len());
    let mut found_active = false;
    for bracket in brackets {
        if found_active {
            evaluated.push(EvaluatedBracket {
                floor: None,
                ceiling: None,
                is_active: Some(false),
                missing: MissingVariables::new(),
            });
            continue;
        }
        let mut missing = MissingVariables::new();
        let floor_node = ctx.evaluate(&bracket.floor)?;
        missing.merge(&floor_node.missing_variables);
        let ceiling_value = match &bracket.ceiling {
            Some(node) => {
                let evaluated_ceiling = ctx.evaluate(node)?;
                missing.merge(&evaluated_ceiling.missing_variables);
                evaluated_ceiling.value.as_number()
            }
            None => Some(f64::INFINITY),
        };
        let floor = match (floor_node.value.as_number(), scale) {
            (Some(f), Some(s)) => Some(f * s),
            _ => None,
        };
        let ceiling = match (ceiling_value, scale) {
            (Some(c), Some(s)) if c.is_finite() => Some(c * s),
            (Some(c), Some(_)) => Some(c),
            _ => None,
        };
        let is_active = match (base_amount, floor, ceiling) {
            (Some(amount), Some(floor), Some(ceiling)) => {
                Some(amount >= floor && amount < ceiling)
            }
            _ => None,
        };
        if is_active.is_none() {
            let rate = ctx.evaluate(&bracket.rate)?;
            missing.merge(&rate.missing_variables);
        }
        if is_active == Some(true) {
            found_active = true;
        }
        evaluated.push(EvaluatedBracket {
            floor,
            ceiling,
            is_active,
            missing,
        });
    }
    Ok(evaluated)
}

fn rate_in_percent(node: &Rc<Node>, ctx: &mut EvalContext) -> EngineResult<Evaluated> {
    let evaluated = ctx.evaluate(node)?;
    match convert_to_unit(&evaluated, &Unit::percent()) {
        Ok(converted) => Ok(converted),
        Err(err) => {
            ctx.logger().warn(&format!("in 'taux progressif': {err}"));
            Ok(Evaluated {
                unit: Some(Unit::percent()),
                ..evaluated
            })
        }
    }
}

pub fn evaluate(node: &Node, ctx: &mut EvalContext) -> EngineResult<Evaluated> {
    let Node::ProgressiveRate { base, multiplier, brackets } = node else {
        return Err(EngineError::Internal("progressive-rate evaluator got another kind".into()));
    };
    let Some(last_bracket) = brackets.last() else {
        return Err(EngineError::Internal("progressive schedule without tiers".into()));
    };
    let base = ctx.evaluate(base)?;
    let multiplier = ctx.evaluate(multiplier)?;
    let evaluated = evaluate_brackets(brackets, &base, &multiplier, ctx)?;
    let percent = Unit::percent();

    // Degenerate top tier: every tier is decidedly inactive (the base sits
    // beyond a bounded schedule), or the active tier is the unbounded last
    // one. The schedule's top rate applies regardless of the base amount.
    let all_inactive = evaluated.iter().all(|b| b.is_active == Some(false));
    let top_tier_active = last_bracket.ceiling.is_none()
        && evaluated.last().map(|b| b.is_active) == Some(Some(true));
    if all_inactive || top_tier_active {
        let rate = rate_in_percent(&last_bracket.rate, ctx)?;
        return Ok(Evaluated {
            value: rate.value,
            unit: Some(percent),
            missing_variables: rate.missing_variables,
        });
    }

    // Activation not decidable yet: report everything that could decide it.
    let active_index = evaluated.iter().position(|b| b.is_active == Some(true));
    let bounds = active_index.and_then(|i| {
        let tier = &evaluated[i];
        Some((i, tier.floor?, tier.ceiling?))
    });
    let (index, floor, ceiling, amount) = match (bounds, base.value.as_number()) {
        (Some((i, floor, ceiling)), Some(amount)) => (i, floor, ceiling, amount),
        _ => {
            let mut missing = base.missing_variables.clone();
            missing.merge(&multiplier.missing_variables);
            for bracket in &evaluated {
                missing.merge(&bracket.missing);
            }
            return Ok(Evaluated {
                value: NodeValue::Unknown,
                unit: Some(percent),
                missing_variables: missing,
            });
        }
    };

    // An interior tier is active: interpolate linearly between the previous
    // tier's rate and this tier's rate across the tier's span.
    let active_rate = rate_in_percent(&brackets[index].rate, ctx)?;
    let previous_rate = if index > 0 {
        rate_in_percent(&brackets[index - 1].rate, ctx)?
    } else {
        active_rate.clone()
    };
    let (lower, upper) = match (previous_rate.value.as_number(), active_rate.value.as_number()) {
        (Some(lower), Some(upper)) => (lower, upper),
        _ => {
            let mut missing = previous_rate.missing_variables.clone();
            missing.merge(&active_rate.missing_variables);
            return Ok(Evaluated {
                value: NodeValue::Unknown,
                unit: Some(percent),
                missing_variables: missing,
            });
        }
    };

    let coefficient = (upper - lower) / (ceiling - floor);
    Ok(Evaluated {
        value: NodeValue::Number(lower + (amount - floor) * coefficient),
        unit: Some(percent),
        missing_variables: MissingVariables::new(),
    })
}

//! Physical units: parsing, serialization, inference, conversion.
//!
//! A unit is a list of numerator names over a list of denominator names
//! (`€/mois`, `kgCO2e/km . an`). Conversion between two units is possible
//! when their names pair up within the same dimension; a unit-less magnitude
//! adopts any requested unit unchanged, since a bare number authored as a
//! rate or an amount is taken to be already denominated.

use crate::value::{Evaluated, NodeValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub numerators: Vec<String>,
    pub denominators: Vec<String>,
}

impl Unit {
    pub fn is_empty(&self) -> bool {
        self.numerators.is_empty() && self.denominators.is_empty()
    }

    /// The percent unit, carried by every rate result.
    pub fn percent() -> Self {
        Unit {
            numerators: vec!["%".to_string()],
            denominators: Vec::new(),
        }
    }
}

/// Raised when two units cannot be reconciled. Callers treat this as a
/// recoverable condition: log it and keep the raw magnitudes.
#[derive(Debug, Error)]
#[error("unit '{from}' is not convertible into '{to}'")]
pub struct UnitConversionError {
    pub from: String,
    pub to: String,
}

/// Parse a serialized unit: numerators separated by `.`, an optional `/`
/// introducing denominators.
pub fn parse_unit(text: &str) -> Unit {
    let (numerators, denominators) = match text.split_once('/') {
        Some((num, den)) => (num, Some(den)),
        None => (text, None),
    };
    let names = |part: &str| {
        part.split('.')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect::<Vec<_>>()
    };
    Unit {
        numerators: names(numerators),
        denominators: denominators.map(names).unwrap_or_default(),
    }
}

pub fn serialize_unit(unit: &Unit) -> String {
    let join = |names: &[String]| names.join(".");
    if unit.denominators.is_empty() {
        join(&unit.numerators)
    } else {
        format!("{}/{}", join(&unit.numerators), join(&unit.denominators))
    }
}

// ── Conversion ────────────────────────────────────────────────────────────

/// Base factors per unit name, grouped by dimension. Two names convert into
/// one another only within the same dimension.
fn base_factor(name: &str) -> Option<(u8, f64)> {
    match name {
        "jour" => Some((0, 1.0)),
        "semaine" => Some((0, 7.0)),
        "mois" => Some((0, 365.25 / 12.0)),
        "trimestre" => Some((0, 365.25 / 4.0)),
        "an" => Some((0, 365.25)),
        "€" => Some((1, 1.0)),
        "k€" => Some((1, 1_000.0)),
        _ => None,
    }
}

fn name_factor(from: &str, to: &str) -> Option<f64> {
    if from == to {
        return Some(1.0);
    }
    match (base_factor(from), base_factor(to)) {
        (Some((da, fa)), Some((db, fb))) if da == db => Some(fa / fb),
        _ => None,
    }
}

/// Pair every name of `from` with a convertible name of `to` and accumulate
/// the factor. `None` when the lists cannot be reconciled.
fn list_factor(from: &[String], to: &[String]) -> Option<f64> {
    if from.len() != to.len() {
        return None;
    }
    let mut pool: Vec<&String> = to.iter().collect();
    let mut factor = 1.0;
    'names: for name in from {
        for i in 0..pool.len() {
            if let Some(k) = name_factor(name, pool[i]) {
                factor *= k;
                pool.remove(i);
                continue 'names;
            }
        }
        return None;
    }
    Some(factor)
}

/// Convert a magnitude between units. A missing or empty source unit adopts
/// the target as-is; converting into an empty unit drops the unit unchanged.
pub fn convert(
    magnitude: f64,
    from: Option<&Unit>,
    to: &Unit,
) -> Result<f64, UnitConversionError> {
    let from = match from {
        Some(u) if !u.is_empty() => u,
        _ => return Ok(magnitude),
    };
    if to.is_empty() || from == to {
        return Ok(magnitude);
    }
    let numerators = list_factor(&from.numerators, &to.numerators);
    let denominators = list_factor(&from.denominators, &to.denominators);
    match (numerators, denominators) {
        (Some(n), Some(d)) => Ok(magnitude * n / d),
        _ => Err(UnitConversionError {
            from: serialize_unit(from),
            to: serialize_unit(to),
        }),
    }
}

/// Convert an evaluated node into the target unit. Non-numeric values adopt
/// the unit without a magnitude change.
pub fn convert_to_unit(
    evaluated: &Evaluated,
    target: &Unit,
) -> Result<Evaluated, UnitConversionError> {
    let value = match evaluated.value {
        NodeValue::Number(n) => NodeValue::Number(convert(n, evaluated.unit.as_ref(), target)?),
        ref other => other.clone(),
    };
    Ok(Evaluated {
        value,
        unit: Some(target.clone()),
        missing_variables: evaluated.missing_variables.clone(),
    })
}

// ── Inference ─────────────────────────────────────────────────────────────

/// The unit of a multiplication or division, composing both operands and
/// cancelling names present on both sides of the fraction.
fn compose(left: Option<&Unit>, right: Option<&Unit>, invert_right: bool) -> Option<Unit> {
    if left.is_none() && right.is_none() {
        return None;
    }
    let mut numerators: Vec<String> = left.map(|u| u.numerators.clone()).unwrap_or_default();
    let mut denominators: Vec<String> = left.map(|u| u.denominators.clone()).unwrap_or_default();
    if let Some(r) = right {
        if invert_right {
            numerators.extend(r.denominators.iter().cloned());
            denominators.extend(r.numerators.iter().cloned());
        } else {
            numerators.extend(r.numerators.iter().cloned());
            denominators.extend(r.denominators.iter().cloned());
        }
    }
    // Cancel one-for-one
    let mut cancelled = Vec::with_capacity(numerators.len());
    for name in numerators {
        if let Some(i) = denominators.iter().position(|d| *d == name) {
            denominators.remove(i);
        } else {
            cancelled.push(name);
        }
    }
    let unit = Unit {
        numerators: cancelled,
        denominators,
    };
    if unit.is_empty() {
        None
    } else {
        Some(unit)
    }
}

/// Infer the unit of an arithmetic operation. Comparisons carry no unit;
/// addition and subtraction assume aligned operands and keep the known one.
pub fn infer_unit(
    operator: crate::node::Operator,
    left: Option<&Unit>,
    right: Option<&Unit>,
) -> Option<Unit> {
    use crate::node::Operator;
    match operator {
        Operator::Mul => compose(left, right, false),
        Operator::Div => compose(left, right, true),
        Operator::Add | Operator::Sub => left.or(right).cloned(),
        _ => None,
    }
}

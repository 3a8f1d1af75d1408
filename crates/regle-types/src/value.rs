//! Evaluated values and the shared display convention.

use crate::missing::MissingVariables;
use crate::unit::{serialize_unit, Unit};
use serde::{Deserialize, Serialize};

/// The value carried by an evaluated node.
///
/// `Null` is a decided absence (the rule is not applicable); `Unknown` means
/// the value cannot be computed yet because some upstream answer is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeValue {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Unknown,
}

impl NodeValue {
    pub fn is_unknown(&self) -> bool {
        matches!(self, NodeValue::Unknown)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            NodeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Truthiness used by applicability conditions and variations.
    ///
    /// `Null` counts as false; `Unknown` is undecided and yields `None`.
    pub fn truth(&self) -> Option<bool> {
        match self {
            NodeValue::Unknown => None,
            NodeValue::Bool(b) => Some(*b),
            NodeValue::Null => Some(false),
            NodeValue::Number(n) => Some(*n != 0.0),
            NodeValue::Str(_) => Some(true),
        }
    }
}

/// The result of evaluating a node: a value, an optional unit, and the
/// merged missing-variable set. Evaluation constructs these; it never
/// mutates the input tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluated {
    pub value: NodeValue,
    pub unit: Option<Unit>,
    pub missing_variables: MissingVariables,
}

impl Evaluated {
    pub fn of(value: NodeValue) -> Self {
        Self {
            value,
            unit: None,
            missing_variables: MissingVariables::new(),
        }
    }

    pub fn unknown(missing_variables: MissingVariables) -> Self {
        Self {
            value: NodeValue::Unknown,
            unit: None,
            missing_variables,
        }
    }
}

/// Format an evaluated value for display, as used by interpolated texts.
pub fn format_value(value: &NodeValue, unit: Option<&Unit>) -> String {
    match value {
        NodeValue::Number(n) => {
            let magnitude = if n.fract() == 0.0 && n.is_finite() {
                format!("{}", *n as i64)
            } else {
                format!("{n}")
            };
            match unit {
                Some(u) if !u.is_empty() => format!("{magnitude} {}", serialize_unit(u)),
                _ => magnitude,
            }
        }
        NodeValue::Str(s) => s.clone(),
        NodeValue::Bool(b) => if *b { "oui" } else { "non" }.to_string(),
        NodeValue::Null => "non applicable".to_string(),
        NodeValue::Unknown => "?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::parse_unit;

    #[test]
    fn truthiness() {
        assert_eq!(NodeValue::Bool(true).truth(), Some(true));
        assert_eq!(NodeValue::Null.truth(), Some(false));
        assert_eq!(NodeValue::Number(0.0).truth(), Some(false));
        assert_eq!(NodeValue::Number(3.0).truth(), Some(true));
        assert_eq!(NodeValue::Unknown.truth(), None);
    }

    #[test]
    fn format_integer_and_decimal() {
        assert_eq!(format_value(&NodeValue::Number(1200.0), None), "1200");
        assert_eq!(format_value(&NodeValue::Number(0.5), None), "0.5");
    }

    #[test]
    fn format_with_unit() {
        let unit = parse_unit("€/mois");
        assert_eq!(
            format_value(&NodeValue::Number(1200.0), Some(&unit)),
            "1200 €/mois"
        );
    }

    #[test]
    fn format_booleans_and_absences() {
        assert_eq!(format_value(&NodeValue::Bool(true), None), "oui");
        assert_eq!(format_value(&NodeValue::Bool(false), None), "non");
        assert_eq!(format_value(&NodeValue::Null, None), "non applicable");
    }
}

//! Rules: parsing rule bodies, applicability, and reference resolution.
//!
//! A rule's value is decided in layers: a disabling ancestor or a failing
//! applicability condition makes it `Null` without ever reaching the
//! formula; an externally supplied answer wins over the formula; a rule
//! without a formula reports itself as a missing variable, taking its
//! default value in the meantime.

use crate::context::{EvalContext, Registry};
use crate::parse::{parse, ParseContext};
use crate::replacement;
use regle_types::{
    EngineError, EngineResult, Evaluated, MissingVariables, Node, NodeKind, NodeValue, RuleData,
};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

/// Rule-body fields consumed here rather than parsed as a mechanism.
const RULE_KEYS: [&str; 8] = [
    "formule",
    "valeur",
    "non applicable si",
    "applicable si",
    "question",
    "par défaut",
    "remplace",
    "rend non applicable",
];

/// Authoring metadata, accepted and ignored.
const META_KEYS: [&str; 6] = [
    "titre",
    "description",
    "note",
    "références",
    "icônes",
    "résumé",
];

pub fn register(registry: &mut Registry) {
    registry.register(NodeKind::Rule, evaluate_rule);
    registry.register(NodeKind::Reference, evaluate_reference);
}

// ── Parsing ───────────────────────────────────────────────────────────────

/// Parses a whole rule set, assigning replacement identifiers in
/// declaration order.
pub(crate) struct RuleParser {
    next_replacement_id: u32,
}

impl RuleParser {
    pub fn new() -> Self {
        Self {
            next_replacement_id: 0,
        }
    }

    pub fn parse_rules(&mut self, raw: &Value) -> EngineResult<HashMap<String, Rc<RuleData>>> {
        let entries = raw.as_object().ok_or_else(|| EngineError::Parse {
            rule: String::new(),
            message: "a rule set is an object mapping names to rule bodies".into(),
        })?;
        let names: BTreeSet<String> = entries.keys().map(|k| k.trim().to_string()).collect();
        let mut rules = HashMap::with_capacity(entries.len());
        for (name, body) in entries {
            let name = name.trim();
            let rule = self.parse_rule(name, body, &names)?;
            rules.insert(name.to_string(), Rc::new(rule));
        }
        Ok(rules)
    }

    fn parse_rule(
        &mut self,
        name: &str,
        body: &Value,
        names: &BTreeSet<String>,
    ) -> EngineResult<RuleData> {
        let ctx = ParseContext::new(name);
        let mut rule = RuleData {
            name: name.to_string(),
            parent: parent_of(name, names),
            not_applicable_if: Vec::new(),
            applicable_if: Vec::new(),
            question: None,
            default: None,
            formula: None,
            replacements: Vec::new(),
        };

        let Some(map) = body.as_object() else {
            // Shorthand: the body is the formula itself.
            rule.formula = Some(parse(body, &ctx)?);
            return Ok(rule);
        };

        if let Some(raw) = map.get("formule").or_else(|| map.get("valeur")) {
            rule.formula = Some(parse(raw, &ctx)?);
        }
        for raw in conditions(map.get("non applicable si")) {
            rule.not_applicable_if.push(parse(raw, &ctx)?);
        }
        for raw in conditions(map.get("applicable si")) {
            rule.applicable_if.push(parse(raw, &ctx)?);
        }
        rule.question = map.get("question").and_then(Value::as_str).map(String::from);
        if let Some(raw) = map.get("par défaut") {
            rule.default = Some(parse(raw, &ctx)?);
        }
        if let Some(raw) = map.get("remplace") {
            rule.replacements.extend(replacement::parse_replacements(
                raw,
                &ctx,
                &mut self.next_replacement_id,
            )?);
        }
        if let Some(raw) = map.get("rend non applicable") {
            rule.replacements
                .extend(replacement::parse_rend_non_applicable(
                    raw,
                    &ctx,
                    &mut self.next_replacement_id,
                )?);
        }

        // Any leftover key is a mechanism authored directly on the rule.
        let mechanism_keys: Vec<&String> = map
            .keys()
            .filter(|k| !RULE_KEYS.contains(&k.as_str()) && !META_KEYS.contains(&k.as_str()))
            .collect();
        if let Some(&key) = mechanism_keys.first() {
            if mechanism_keys.len() > 1 {
                return Err(ctx.error("a rule can carry a single mechanism"));
            }
            if rule.formula.is_some() {
                return Err(ctx.error("a rule cannot carry both a formula and a mechanism"));
            }
            rule.formula = Some(crate::parse::parse_mechanism(key, &map[key.as_str()], &ctx)?);
        }
        Ok(rule)
    }
}

fn conditions(raw: Option<&Value>) -> Vec<&Value> {
    match raw {
        None => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
    }
}

/// Closest enclosing namespace that is itself a rule.
fn parent_of(name: &str, names: &BTreeSet<String>) -> Option<String> {
    let mut current = name;
    while let Some(index) = current.rfind(" . ") {
        let prefix = &current[..index];
        if names.contains(prefix) {
            return Some(prefix.to_string());
        }
        current = prefix;
    }
    None
}

// ── Evaluation ────────────────────────────────────────────────────────────

fn evaluate_reference(node: &Node, ctx: &mut EvalContext) -> EngineResult<Evaluated> {
    let Node::Reference { name, .. } = node else {
        return Err(EngineError::Internal("reference evaluator got another kind".into()));
    };
    // Name resolution happened upstream; an unknown name here is a broken
    // pipeline, not bad user data.
    let rule = ctx
        .rule(name)
        .cloned()
        .ok_or_else(|| EngineError::Internal(format!("reference to unknown rule '{name}'")))?;
    ctx.evaluate(&Node::Rule(rule))
}

fn evaluate_rule(node: &Node, ctx: &mut EvalContext) -> EngineResult<Evaluated> {
    let Node::Rule(rule) = node else {
        return Err(EngineError::Internal("rule evaluator got another kind".into()));
    };
    evaluate_rule_layers(rule, ctx, false)
}

/// Outcome of the applicability layer: ancestors able to disable this rule,
/// then the rule's own conditions.
#[derive(Default)]
struct Gate {
    missing: MissingVariables,
    undecided: bool,
    refused: bool,
}

fn applicability_gate(rule: &RuleData, ctx: &mut EvalContext) -> EngineResult<Gate> {
    let mut gate = Gate::default();

    // Walk up to the closest nullable ancestor; probing it covers the
    // ancestors above it. Ancestors defined by a plain formula cannot
    // disable their descendants and are skipped entirely.
    let mut ancestor = rule.parent.clone();
    while let Some(name) = ancestor {
        let parent = ctx
            .rule(&name)
            .cloned()
            .ok_or_else(|| EngineError::Internal(format!("missing parent rule '{name}'")))?;
        if parent.is_nullable() {
            let evaluated = evaluate_rule_layers(&parent, ctx, true)?;
            gate.missing.merge(&evaluated.missing_variables);
            match evaluated.value.truth() {
                Some(false) => {
                    gate.refused = true;
                    return Ok(gate);
                }
                None => gate.undecided = true,
                Some(true) => {}
            }
            break;
        }
        ancestor = parent.parent.clone();
    }

    // Conditions always contribute their missing variables, even once
    // decided: the decision may rest on defaulted answers and change when
    // they are given. Conditions after a decided refusal stay unevaluated.
    for condition in &rule.not_applicable_if {
        let evaluated = ctx.evaluate(condition)?;
        gate.missing.merge(&evaluated.missing_variables);
        match evaluated.value.truth() {
            Some(true) => {
                gate.refused = true;
                return Ok(gate);
            }
            None => gate.undecided = true,
            Some(false) => {}
        }
    }
    for condition in &rule.applicable_if {
        let evaluated = ctx.evaluate(condition)?;
        gate.missing.merge(&evaluated.missing_variables);
        match evaluated.value.truth() {
            Some(false) => {
                gate.refused = true;
                return Ok(gate);
            }
            None => gate.undecided = true,
            Some(true) => {}
        }
    }
    Ok(gate)
}

/// Evaluate a rule layer by layer. As a `disabling_probe` (an ancestor
/// checked only for its power to disable descendants), a rule defined by a
/// real formula counts as plainly applicable without evaluating the formula
/// — probing a container's formula would recurse straight back into the
/// descendant being evaluated. Forced choices are probed like questions:
/// they resolve from the outside or not at all.
fn evaluate_rule_layers(
    rule: &RuleData,
    ctx: &mut EvalContext,
    disabling_probe: bool,
) -> EngineResult<Evaluated> {
    // A rule re-entered while it is being decided — an ancestor probe or an
    // applicability condition referring back into the rule's own namespace —
    // counts as plainly applicable. This is the only tolerated
    // self-reference; genuine formula cycles are rejected upstream.
    if ctx.is_evaluating(&rule.name) {
        return Ok(Evaluated {
            value: NodeValue::Bool(true),
            unit: None,
            missing_variables: MissingVariables::new(),
        });
    }
    ctx.enter_rule(&rule.name);
    let result = rule_value(rule, ctx, disabling_probe);
    ctx.exit_rule();
    result
}

fn rule_value(
    rule: &RuleData,
    ctx: &mut EvalContext,
    disabling_probe: bool,
) -> EngineResult<Evaluated> {
    let gate = applicability_gate(rule, ctx)?;
    if gate.refused {
        return Ok(Evaluated {
            value: NodeValue::Null,
            unit: None,
            missing_variables: gate.missing,
        });
    }
    let mut missing = gate.missing;
    let undecided = gate.undecided;

    // An externally supplied answer wins over the formula.
    if let Some(answer) = ctx.situation_value(&rule.name) {
        let evaluated = ctx.evaluate(&answer)?;
        missing.merge(&evaluated.missing_variables);
        return Ok(finish(evaluated, missing, undecided));
    }

    if let Some(formula) = &rule.formula {
        let forced_choice = matches!(formula.as_ref(), Node::OnePossibility { .. });
        if disabling_probe && !forced_choice {
            return Ok(if undecided {
                Evaluated::unknown(missing)
            } else {
                Evaluated {
                    value: NodeValue::Bool(true),
                    unit: None,
                    missing_variables: missing,
                }
            });
        }
        let evaluated = ctx.evaluate(formula)?;
        missing.merge(&evaluated.missing_variables);
        return Ok(finish(evaluated, missing, undecided));
    }

    // No formula: the rule is a question for the outside world. It reports
    // itself and takes its default value in the meantime.
    let defaulted = match &rule.default {
        Some(default) => {
            let evaluated = ctx.evaluate(default)?;
            missing.merge(&evaluated.missing_variables);
            Some(evaluated)
        }
        None => None,
    };
    missing.bump(rule.name.clone(), 1);
    Ok(match defaulted {
        Some(evaluated) if !undecided => Evaluated {
            value: evaluated.value,
            unit: evaluated.unit,
            missing_variables: missing,
        },
        _ => Evaluated::unknown(missing),
    })
}

fn finish(evaluated: Evaluated, missing: MissingVariables, undecided: bool) -> Evaluated {
    if undecided {
        Evaluated::unknown(missing)
    } else {
        Evaluated {
            value: evaluated.value,
            unit: evaluated.unit,
            missing_variables: missing,
        }
    }
}

//! Rule-level overrides: parsing, indexing, and inlining.
//!
//! A replacement makes references to one rule resolve to another expression
//! within some namespace scope, conditioned on the declaring rule being
//! applicable. Ahead of any evaluation, every reference with applicable
//! overrides is rewritten into a variations node: the overriding rules'
//! applicabilities in precedence order, then an always-true fallback to the
//! original reference.
//!
//! Occurrences sharing the same combination of applicable overrides share
//! one variations node: the cache key is the hyphen-joined sequence of the
//! override identifiers, so unrelated references with an identical
//! combination reuse the identical subtree and its evaluation cost.

use crate::context::Logger;
use crate::parse::{parse, ParseContext};
use regle_types::{
    Bracket, Branch, EngineError, EngineResult, Node, NodeValue, ReplacementRule, RuleData,
    TextPart,
};
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;

// ── Parsing ───────────────────────────────────────────────────────────────

/// Parse `remplace` declarations: a bare rule name, an object with `règle`,
/// `par`, `dans`, `sauf dans`, or a list of either. Identifiers are assigned
/// sequentially in declaration order from an engine-local counter.
pub(crate) fn parse_replacements(
    raw: &Value,
    ctx: &ParseContext,
    next_id: &mut u32,
) -> EngineResult<Vec<Rc<ReplacementRule>>> {
    let items: Vec<&Value> = match raw {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };
    items
        .into_iter()
        .map(|item| parse_one(item, ctx, next_id))
        .collect()
}

/// `rend non applicable` is a replacement whose consequence is the constant
/// absence: the target becomes not applicable wherever the override holds.
pub(crate) fn parse_rend_non_applicable(
    raw: &Value,
    ctx: &ParseContext,
    next_id: &mut u32,
) -> EngineResult<Vec<Rc<ReplacementRule>>> {
    let replacements = parse_replacements(raw, ctx, next_id)?;
    Ok(replacements
        .into_iter()
        .map(|replacement| {
            let mut replacement = (*replacement).clone();
            replacement.replacement = Rc::new(Node::constant(NodeValue::Null));
            Rc::new(replacement)
        })
        .collect())
}

fn parse_one(
    raw: &Value,
    ctx: &ParseContext,
    next_id: &mut u32,
) -> EngineResult<Rc<ReplacementRule>> {
    let (target, replacement_raw, whitelist, blacklist) = match raw {
        Value::String(name) => (name.clone(), None, Vec::new(), Vec::new()),
        Value::Object(map) => {
            let target = map
                .get("règle")
                .and_then(Value::as_str)
                .ok_or_else(|| ctx.error("'remplace' needs a 'règle' name"))?
                .to_string();
            (
                target,
                map.get("par"),
                names(map.get("dans")),
                names(map.get("sauf dans")),
            )
        }
        _ => return Err(ctx.error("'remplace' expects a rule name or an object")),
    };
    let replacement = match replacement_raw {
        Some(raw) => parse(raw, ctx)?,
        // Without 'par', references resolve to the declaring rule itself.
        None => Rc::new(Node::Reference {
            name: ctx.dotted_name.clone(),
            context: ctx.dotted_name.clone(),
        }),
    };
    let id = *next_id;
    *next_id += 1;
    Ok(Rc::new(ReplacementRule {
        id,
        definition_rule: ctx.dotted_name.clone(),
        replaced_reference: target.trim().to_string(),
        replacement,
        whitelist,
        blacklist,
    }))
}

fn names(raw: Option<&Value>) -> Vec<String> {
    let collect = |value: &Value| value.as_str().map(|s| s.trim().to_string());
    match raw {
        None => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(collect).collect(),
        Some(single) => collect(single).into_iter().collect(),
    }
}

// ── Indexing ──────────────────────────────────────────────────────────────

/// Collect every rule's replacement declarations, keyed by the replaced
/// rule's name, in declaration order. A declaration without a resolvable
/// target denotes a broken upstream pipeline.
pub(crate) fn build_index(
    rules: &HashMap<String, Rc<RuleData>>,
) -> EngineResult<HashMap<String, Vec<Rc<ReplacementRule>>>> {
    let mut index: HashMap<String, Vec<Rc<ReplacementRule>>> = HashMap::new();
    for rule in rules.values() {
        for replacement in &rule.replacements {
            if replacement.replaced_reference.is_empty() {
                return Err(EngineError::Internal(format!(
                    "replacement declared by '{}' has no resolved target",
                    replacement.definition_rule
                )));
            }
            index
                .entry(replacement.replaced_reference.clone())
                .or_default()
                .push(Rc::clone(replacement));
        }
    }
    for candidates in index.values_mut() {
        candidates.sort_by_key(|r| r.id);
    }
    Ok(index)
}

// ── Inlining ──────────────────────────────────────────────────────────────

pub(crate) struct Inliner<'a> {
    index: &'a HashMap<String, Vec<Rc<ReplacementRule>>>,
    cache: &'a mut HashMap<String, Rc<Node>>,
    logger: &'a dyn Logger,
    verbose: bool,
}

/// Rewrite every rule's parsed nodes, sharing the variations cache across
/// the whole rule set.
pub(crate) fn inline_all(
    rules: HashMap<String, Rc<RuleData>>,
    index: &HashMap<String, Vec<Rc<ReplacementRule>>>,
    cache: &mut HashMap<String, Rc<Node>>,
    logger: &dyn Logger,
    verbose: bool,
) -> HashMap<String, Rc<RuleData>> {
    let mut inliner = Inliner {
        index,
        cache,
        logger,
        verbose,
    };
    rules
        .into_iter()
        .map(|(name, rule)| {
            let rewritten = RuleData {
                name: rule.name.clone(),
                parent: rule.parent.clone(),
                not_applicable_if: rule
                    .not_applicable_if
                    .iter()
                    .map(|n| inliner.transform(n))
                    .collect(),
                applicable_if: rule
                    .applicable_if
                    .iter()
                    .map(|n| inliner.transform(n))
                    .collect(),
                question: rule.question.clone(),
                default: rule.default.as_ref().map(|n| inliner.transform(n)),
                formula: rule.formula.as_ref().map(|n| inliner.transform(n)),
                replacements: rule.replacements.clone(),
            };
            (name, Rc::new(rewritten))
        })
        .collect()
}

impl Inliner<'_> {
    /// Depth-first rewrite. Variations and forced-choice nodes are terminal
    /// for this transform — descending into them would rewrite override
    /// fallbacks and re-enter override cycles. A recalcul's amendment keys
    /// select which rules are being answered and are never rewritten.
    fn transform(&mut self, node: &Rc<Node>) -> Rc<Node> {
        match node.as_ref() {
            Node::Constant { .. }
            | Node::Variations { .. }
            | Node::OnePossibility { .. }
            | Node::Rule(_) => Rc::clone(node),
            Node::Reference { name, context } => self.replace(node, name, context),
            Node::Operation { operator, left, right } => Rc::new(Node::Operation {
                operator: *operator,
                left: self.transform(left),
                right: self.transform(right),
            }),
            Node::Sum { terms } => Rc::new(Node::Sum {
                terms: terms.iter().map(|t| self.transform(t)).collect(),
            }),
            Node::AllOf { conditions } => Rc::new(Node::AllOf {
                conditions: conditions.iter().map(|c| self.transform(c)).collect(),
            }),
            Node::AnyOf { conditions } => Rc::new(Node::AnyOf {
                conditions: conditions.iter().map(|c| self.transform(c)).collect(),
            }),
            Node::ProgressiveRate { base, multiplier, brackets } => {
                Rc::new(Node::ProgressiveRate {
                    base: self.transform(base),
                    multiplier: self.transform(multiplier),
                    brackets: brackets
                        .iter()
                        .map(|bracket| Bracket {
                            floor: self.transform(&bracket.floor),
                            ceiling: bracket.ceiling.as_ref().map(|c| self.transform(c)),
                            rate: self.transform(&bracket.rate),
                        })
                        .collect(),
                })
            }
            Node::Text { parts } => Rc::new(Node::Text {
                parts: parts
                    .iter()
                    .map(|part| match part {
                        TextPart::Literal(text) => TextPart::Literal(text.clone()),
                        TextPart::Expr(expression) => {
                            TextPart::Expr(self.transform(expression))
                        }
                    })
                    .collect(),
            }),
            Node::Recalcul { target, amendments, context } => Rc::new(Node::Recalcul {
                target: target.as_ref().map(|t| self.transform(t)),
                amendments: amendments
                    .iter()
                    .map(|(key, value)| (Rc::clone(key), self.transform(value)))
                    .collect(),
                context: context.clone(),
            }),
        }
    }

    /// Rewrite one reference occurrence, if any override applies to it.
    fn replace(&mut self, node: &Rc<Node>, name: &str, context: &str) -> Rc<Node> {
        let Some(candidates) = self.index.get(name) else {
            return Rc::clone(node);
        };
        let mut applicable: Vec<&Rc<ReplacementRule>> = candidates
            .iter()
            .filter(|r| r.definition_rule != context)
            .filter(|r| {
                r.whitelist.is_empty()
                    || r.whitelist.iter().any(|prefix| in_namespace(context, prefix))
            })
            .filter(|r| {
                r.blacklist
                    .iter()
                    .all(|prefix| !in_namespace(context, prefix))
            })
            .collect();
        if applicable.is_empty() {
            return Rc::clone(node);
        }
        // Scoped overrides take precedence: whitelisted declarations first,
        // then blacklisted ones, declaration order breaking ties.
        applicable.sort_by_key(|r| (r.whitelist.is_empty(), r.blacklist.is_empty()));

        if applicable.len() > 1 && self.verbose {
            let declarations: Vec<&str> = applicable
                .iter()
                .map(|r| r.definition_rule.as_str())
                .collect();
            self.logger.warn(&format!(
                "several replacements apply to '{name}' in '{context}'; they resolve in this \
                 order: {}",
                declarations.join(", ")
            ));
        }

        let key = applicable
            .iter()
            .map(|r| r.id.to_string())
            .collect::<Vec<_>>()
            .join("-");
        if let Some(shared) = self.cache.get(&key) {
            return Rc::clone(shared);
        }
        let branches: Vec<Branch> = applicable
            .iter()
            .map(|replacement| Branch {
                condition: Rc::new(Node::Reference {
                    name: replacement.definition_rule.clone(),
                    context: replacement.definition_rule.clone(),
                }),
                consequence: Rc::clone(&replacement.replacement),
            })
            .chain(std::iter::once(Branch {
                condition: Rc::new(Node::constant(NodeValue::Bool(true))),
                consequence: Rc::clone(node),
            }))
            .collect();
        let variations = Rc::new(Node::Variations { branches });
        self.cache.insert(key, Rc::clone(&variations));
        variations
    }
}

/// Segment-aware namespace prefix test: `a . b` is inside `a`, but `ab`
/// is not.
fn in_namespace(name: &str, prefix: &str) -> bool {
    name == prefix || name.starts_with(&format!("{prefix} . "))
}

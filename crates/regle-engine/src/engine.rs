//! The engine: owns one rule set, its caches, and its evaluator registry.

use crate::context::{EvalContext, Logger, Registry, TracingLogger};
use crate::parse::{parse, ParseContext};
use crate::replacement;
use crate::rule::{self, RuleParser};
use crate::mechanisms;
use regle_types::{EngineError, EngineResult, Evaluated, Node, RuleData};
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// Evaluates one loaded rule set. All mutable state — the replacement
/// identifier space, the variations cache, the situation — is owned by the
/// instance; two engines never share anything.
pub struct Engine {
    rules: HashMap<String, Rc<RuleData>>,
    situation: HashMap<String, Rc<Node>>,
    registry: Registry,
    logger: Box<dyn Logger>,
    variations_cache: HashMap<String, Rc<Node>>,
}

impl Engine {
    /// Build an engine from a raw rule set: an object mapping rule names to
    /// rule bodies. Parses every rule, then rewrites overridden references
    /// ahead of any evaluation.
    pub fn new(raw: &Value) -> EngineResult<Self> {
        Self::with_options(raw, Box::new(TracingLogger), false)
    }

    pub fn with_logger(raw: &Value, logger: Box<dyn Logger>) -> EngineResult<Self> {
        Self::with_options(raw, logger, false)
    }

    /// `verbose_replacements` enables the diagnostic enumerating several
    /// simultaneously applicable replacements for one reference.
    pub fn with_options(
        raw: &Value,
        logger: Box<dyn Logger>,
        verbose_replacements: bool,
    ) -> EngineResult<Self> {
        let mut registry = Registry::new();
        mechanisms::register_all(&mut registry);
        rule::register(&mut registry);

        let rules = RuleParser::new().parse_rules(raw)?;
        let index = replacement::build_index(&rules)?;
        let mut variations_cache = HashMap::new();
        let rules = replacement::inline_all(
            rules,
            &index,
            &mut variations_cache,
            logger.as_ref(),
            verbose_replacements,
        );

        Ok(Self {
            rules,
            situation: HashMap::new(),
            registry,
            logger,
            variations_cache,
        })
    }

    /// Supply externally-known answers: an object mapping rule names to raw
    /// expressions. Replaces any previous situation.
    pub fn set_situation(&mut self, raw: &Value) -> EngineResult<&mut Self> {
        let entries = raw.as_object().ok_or_else(|| EngineError::Parse {
            rule: String::new(),
            message: "a situation is an object mapping names to answers".into(),
        })?;
        let mut situation = HashMap::with_capacity(entries.len());
        for (name, answer) in entries {
            let name = name.trim().to_string();
            if !self.rules.contains_key(&name) {
                return Err(EngineError::UnknownRule(name));
            }
            let ctx = ParseContext::new(name.as_str());
            situation.insert(name, parse(answer, &ctx)?);
        }
        self.situation = situation;
        Ok(self)
    }

    /// Evaluate a rule by name. Callers read `value`, `unit`, and
    /// `missing_variables` off the result.
    pub fn evaluate(&self, name: &str) -> EngineResult<Evaluated> {
        let rule = self
            .rules
            .get(name.trim())
            .ok_or_else(|| EngineError::UnknownRule(name.trim().to_string()))?;
        let node = Node::Rule(Rc::clone(rule));
        self.evaluate_node(&node)
    }

    /// Evaluate an arbitrary node against this engine's rule set.
    pub fn evaluate_node(&self, node: &Node) -> EngineResult<Evaluated> {
        let mut ctx = EvalContext::new(
            &self.rules,
            &self.situation,
            &self.registry,
            self.logger.as_ref(),
        );
        ctx.evaluate(node)
    }

    /// The parsed (and override-rewritten) rule, mainly for hosts rendering
    /// explanations.
    pub fn rule(&self, name: &str) -> Option<&Rc<RuleData>> {
        self.rules.get(name.trim())
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Number of distinct override combinations materialized so far.
    pub fn variations_cache_len(&self) -> usize {
        self.variations_cache.len()
    }
}

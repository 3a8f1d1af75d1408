//! Evaluator registry, evaluation context, and the logger collaborator.

use regle_types::{EngineError, EngineResult, Evaluated, Node, NodeKind, RuleData};
use std::collections::HashMap;
use std::rc::Rc;

/// An evaluator: a pure function turning a node and its context into an
/// evaluated result. Evaluators reach child nodes exclusively through
/// [`EvalContext::evaluate`].
pub type EvalFn = fn(&Node, &mut EvalContext) -> EngineResult<Evaluated>;

/// Maps each node kind to its evaluator. Built once at engine construction;
/// registering a kind twice replaces the previous entry.
#[derive(Default)]
pub struct Registry {
    evaluators: HashMap<NodeKind, EvalFn>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: NodeKind, evaluator: EvalFn) {
        self.evaluators.insert(kind, evaluator);
    }

    pub fn get(&self, kind: NodeKind) -> Option<EvalFn> {
        self.evaluators.get(&kind).copied()
    }
}

/// Sink for recoverable-warning diagnostics (unit mismatches, conflicting
/// replacements). Never required for correctness.
pub trait Logger {
    fn warn(&self, message: &str);
}

/// Default logger: forwards warnings to the `tracing` subscriber.
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn warn(&self, message: &str) {
        tracing::warn!(target: "regle", "{message}");
    }
}

/// The interpreter handle passed explicitly into every evaluator call.
///
/// Carries the recursive evaluate operation, the rule set, the externally
/// supplied situation with its recalcul amendment overlays, and the logger.
pub struct EvalContext<'e> {
    rules: &'e HashMap<String, Rc<RuleData>>,
    situation: &'e HashMap<String, Rc<Node>>,
    registry: &'e Registry,
    logger: &'e dyn Logger,
    overlays: Vec<HashMap<String, Rc<Node>>>,
    rule_stack: Vec<String>,
}

impl<'e> EvalContext<'e> {
    pub(crate) fn new(
        rules: &'e HashMap<String, Rc<RuleData>>,
        situation: &'e HashMap<String, Rc<Node>>,
        registry: &'e Registry,
        logger: &'e dyn Logger,
    ) -> Self {
        Self {
            rules,
            situation,
            registry,
            logger,
            overlays: Vec::new(),
            rule_stack: Vec::new(),
        }
    }

    /// Dispatch a node to its registered evaluator.
    pub fn evaluate(&mut self, node: &Node) -> EngineResult<Evaluated> {
        let evaluator = self
            .registry
            .get(node.kind())
            .ok_or(EngineError::UnregisteredKind(node.kind()))?;
        evaluator(node, self)
    }

    pub fn rule(&self, name: &str) -> Option<&Rc<RuleData>> {
        self.rules.get(name)
    }

    /// The externally supplied answer for a rule, if any. Recalcul
    /// amendments shadow the base situation, innermost first.
    pub fn situation_value(&self, name: &str) -> Option<Rc<Node>> {
        self.overlays
            .iter()
            .rev()
            .find_map(|overlay| overlay.get(name))
            .or_else(|| self.situation.get(name))
            .map(Rc::clone)
    }

    pub fn logger(&self) -> &dyn Logger {
        self.logger
    }

    pub(crate) fn push_overlay(&mut self, overlay: HashMap<String, Rc<Node>>) {
        self.overlays.push(overlay);
    }

    pub(crate) fn pop_overlay(&mut self) {
        self.overlays.pop();
    }

    /// Whether a rule's evaluation is already in progress further up the
    /// call tree.
    pub(crate) fn is_evaluating(&self, name: &str) -> bool {
        self.rule_stack.iter().any(|entry| entry == name)
    }

    pub(crate) fn enter_rule(&mut self, name: &str) {
        self.rule_stack.push(name.to_string());
    }

    pub(crate) fn exit_rule(&mut self) {
        self.rule_stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regle_types::NodeValue;

    fn constant_evaluator(_: &Node, _: &mut EvalContext) -> EngineResult<Evaluated> {
        Ok(Evaluated::of(NodeValue::Number(1.0)))
    }

    #[test]
    fn registration_replaces_previous_entry() {
        let mut registry = Registry::new();
        registry.register(NodeKind::Constant, constant_evaluator);
        assert!(registry.get(NodeKind::Constant).is_some());
        assert!(registry.get(NodeKind::Sum).is_none());
    }
}

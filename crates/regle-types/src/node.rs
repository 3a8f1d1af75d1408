//! Typed nodes of the rule language.
//!
//! A rule's authored body arrives as structured data and is normalized into
//! this closed set of variants. Children are `Rc<Node>`: trees are immutable
//! after parsing, and the replacement inliner hands the same `Rc` to every
//! occurrence sharing an override combination.

use crate::value::NodeValue;
use crate::unit::Unit;
use std::fmt;
use std::rc::Rc;

/// Fieldless discriminant of [`Node`], used for evaluator dispatch and
/// error messages. Displays as the authored mechanism name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Constant,
    Reference,
    Operation,
    Sum,
    AllOf,
    AnyOf,
    Variations,
    ProgressiveRate,
    OnePossibility,
    Text,
    Recalcul,
    Rule,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Constant => "constant",
            NodeKind::Reference => "reference",
            NodeKind::Operation => "operation",
            NodeKind::Sum => "somme",
            NodeKind::AllOf => "toutes ces conditions",
            NodeKind::AnyOf => "une de ces conditions",
            NodeKind::Variations => "variations",
            NodeKind::ProgressiveRate => "taux progressif",
            NodeKind::OnePossibility => "une possibilité",
            NodeKind::Text => "texte",
            NodeKind::Recalcul => "recalcul",
            NodeKind::Rule => "rule",
        };
        f.write_str(name)
    }
}

/// Binary operators, each with its authored key and canonical display symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Mul,
    Div,
    Add,
    Sub,
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
}

impl Operator {
    pub const ALL: [Operator; 10] = [
        Operator::Mul,
        Operator::Div,
        Operator::Add,
        Operator::Sub,
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::Eq,
        Operator::Neq,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Eq => "=",
            Operator::Neq => "!=",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Mul => "×",
            Operator::Div => "∕",
            Operator::Add => "+",
            Operator::Sub => "−",
            Operator::Lt => "<",
            Operator::Lte => "≤",
            Operator::Gt => ">",
            Operator::Gte => "≥",
            Operator::Eq => "=",
            Operator::Neq => "≠",
        }
    }

    pub fn from_key(key: &str) -> Option<Operator> {
        Operator::ALL.into_iter().find(|op| op.key() == key)
    }

    /// Multiplication and division compose units instead of aligning them.
    pub fn is_multiplicative(self) -> bool {
        matches!(self, Operator::Mul | Operator::Div)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::Lt
                | Operator::Lte
                | Operator::Gt
                | Operator::Gte
                | Operator::Eq
                | Operator::Neq
        )
    }
}

/// One condition→consequence pair of a variations node.
#[derive(Debug, Clone)]
pub struct Branch {
    pub condition: Rc<Node>,
    pub consequence: Rc<Node>,
}

/// One tier of a progressive schedule. The floor defaults to the previous
/// tier's ceiling (0 for the first tier); a missing ceiling means +∞.
#[derive(Debug, Clone)]
pub struct Bracket {
    pub floor: Rc<Node>,
    pub ceiling: Option<Rc<Node>>,
    pub rate: Rc<Node>,
}

/// A literal or embedded-expression part of an interpolated text.
#[derive(Debug, Clone)]
pub enum TextPart {
    Literal(String),
    Expr(Rc<Node>),
}

/// A rule-level override directive: within some namespace scope, references
/// to `replaced_reference` resolve to `replacement` whenever the declaring
/// rule is applicable. Created once at parse time, read-only afterwards.
#[derive(Debug, Clone)]
pub struct ReplacementRule {
    /// Engine-local identifier, assigned sequentially in declaration order.
    pub id: u32,
    /// Fully-qualified name of the rule declaring the override.
    pub definition_rule: String,
    /// Fully-qualified name of the replaced rule.
    pub replaced_reference: String,
    pub replacement: Rc<Node>,
    /// Namespace prefixes where the override applies ("dans").
    pub whitelist: Vec<String>,
    /// Namespace prefixes where the override never applies ("sauf dans").
    pub blacklist: Vec<String>,
}

/// A parsed rule: the named unit of the authored namespace tree.
#[derive(Debug, Clone)]
pub struct RuleData {
    pub name: String,
    /// Closest enclosing namespace that is itself a rule.
    pub parent: Option<String>,
    pub not_applicable_if: Vec<Rc<Node>>,
    pub applicable_if: Vec<Rc<Node>>,
    pub question: Option<String>,
    pub default: Option<Rc<Node>>,
    pub formula: Option<Rc<Node>>,
    pub replacements: Vec<Rc<ReplacementRule>>,
}

impl RuleData {
    /// A rule that may resolve to "not applicable" or to no value at all:
    /// it carries applicability conditions, asks a question, or has no
    /// formula. Only such ancestors can disable their descendants.
    pub fn is_nullable(&self) -> bool {
        !self.not_applicable_if.is_empty()
            || !self.applicable_if.is_empty()
            || self.question.is_some()
            || self.formula.is_none()
    }
}

/// A node of the computation graph.
#[derive(Debug, Clone)]
pub enum Node {
    Constant {
        value: NodeValue,
        unit: Option<Unit>,
    },
    /// An already-qualified reference to another rule, tagged with the name
    /// of the rule whose body contains the occurrence.
    Reference {
        name: String,
        context: String,
    },
    Operation {
        operator: Operator,
        left: Rc<Node>,
        right: Rc<Node>,
    },
    Sum {
        terms: Vec<Rc<Node>>,
    },
    AllOf {
        conditions: Vec<Rc<Node>>,
    },
    AnyOf {
        conditions: Vec<Rc<Node>>,
    },
    /// First branch whose condition is decidedly true wins, left to right.
    Variations {
        branches: Vec<Branch>,
    },
    ProgressiveRate {
        base: Rc<Node>,
        multiplier: Rc<Node>,
        brackets: Vec<Bracket>,
    },
    /// A rule whose answer must be supplied externally, among an enumerated
    /// set of possibilities.
    OnePossibility {
        possibilities: Vec<Rc<Node>>,
        mandatory: bool,
        context: String,
    },
    Text {
        parts: Vec<TextPart>,
    },
    /// Re-evaluation of a rule under an amended situation. Amendment keys
    /// are reference nodes selecting the rules being answered.
    Recalcul {
        target: Option<Rc<Node>>,
        amendments: Vec<(Rc<Node>, Rc<Node>)>,
        context: String,
    },
    Rule(Rc<RuleData>),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Constant { .. } => NodeKind::Constant,
            Node::Reference { .. } => NodeKind::Reference,
            Node::Operation { .. } => NodeKind::Operation,
            Node::Sum { .. } => NodeKind::Sum,
            Node::AllOf { .. } => NodeKind::AllOf,
            Node::AnyOf { .. } => NodeKind::AnyOf,
            Node::Variations { .. } => NodeKind::Variations,
            Node::ProgressiveRate { .. } => NodeKind::ProgressiveRate,
            Node::OnePossibility { .. } => NodeKind::OnePossibility,
            Node::Text { .. } => NodeKind::Text,
            Node::Recalcul { .. } => NodeKind::Recalcul,
            Node::Rule(_) => NodeKind::Rule,
        }
    }

    /// A unit-less constant node.
    pub fn constant(value: NodeValue) -> Node {
        Node::Constant { value, unit: None }
    }
}

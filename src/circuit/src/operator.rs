use crate::expr::Expr;
use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies an operator inside its circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperatorId(pub usize);

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op{}", self.0)
    }
}

/// Kinds of circuit operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorKind {
    Source,
    Sink,
    Map,
    Filter,
    FlatMap,
    /// Turns a Z-set into an indexed Z-set; the function returns `(key, value)`.
    Index,
    Join,
    Aggregate,
    IncrementalAggregate,
    WindowAggregate,
    Distinct,
    Sum,
    Subtract,
    Negate,
    Differential,
    Integral,
    Constant,
    Noop,
}

/// Number of inputs an operator kind accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl OperatorKind {
    pub fn arity(self) -> Arity {
        match self {
            OperatorKind::Source | OperatorKind::Constant => Arity::Exactly(0),
            OperatorKind::Join | OperatorKind::Subtract => Arity::Exactly(2),
            OperatorKind::Sum => Arity::AtLeast(1),
            _ => Arity::Exactly(1),
        }
    }

    /// Whether this kind needs a function.
    pub fn has_function(self) -> bool {
        match self {
            OperatorKind::Map
            | OperatorKind::Filter
            | OperatorKind::FlatMap
            | OperatorKind::Index
            | OperatorKind::Join
            | OperatorKind::Aggregate
            | OperatorKind::IncrementalAggregate
            | OperatorKind::WindowAggregate
            | OperatorKind::Constant => true,
            _ => false,
        }
    }

    /// Whether the output may contain weights other than 1, given the same property of the inputs.
    pub fn output_multiset(self, inputs: &[bool]) -> bool {
        let any = inputs.iter().any(|m| *m);
        match self {
            OperatorKind::Source
            | OperatorKind::Constant
            | OperatorKind::Distinct
            | OperatorKind::Aggregate
            | OperatorKind::IncrementalAggregate
            | OperatorKind::WindowAggregate => false,
            OperatorKind::Map | OperatorKind::FlatMap | OperatorKind::Index => true,
            _ => any,
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A circuit node. Operators are immutable once added to a circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    /// Assigned by the circuit.
    pub id: OperatorId,
    pub kind: OperatorKind,
    pub inputs: Vec<OperatorId>,
    /// Per-row function, fold or constant, usually a reference to a local declaration.
    pub function: Option<Expr>,
    /// Frame of a WindowAggregate.
    pub window: Option<Expr>,
    pub output_type: Type,
    /// Computed by the circuit from the kind and the inputs.
    pub is_multiset: bool,
    /// Table or view name, for sources, sinks and no-ops.
    pub name: Option<String>,
    pub comment: Option<String>,
}

impl Operator {
    /// Creates an operator.
    ///
    /// # Arguments
    ///
    /// * `kind` - Operator kind.
    /// * `function` - Function driving the operator, if the kind needs one.
    /// * `output_type` - Type of the produced stream.
    /// * `inputs` - Input operators, in order.
    pub fn new(
        kind: OperatorKind,
        function: Option<Expr>,
        output_type: Type,
        inputs: Vec<OperatorId>,
    ) -> Self {
        Self {
            id: OperatorId(0),
            kind,
            inputs,
            function,
            window: None,
            output_type,
            is_multiset: false,
            name: None,
            comment: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    pub fn with_window(mut self, window: Expr) -> Self {
        self.window = Some(window);
        self
    }

    /// Single input of a unary operator.
    pub fn input(&self) -> Option<OperatorId> {
        if self.inputs.len() == 1 {
            Some(self.inputs[0])
        } else {
            None
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inputs: Vec<String> = self.inputs.iter().map(|i| i.to_string()).collect();
        write!(f, "{} = {}({})", self.id, self.kind, inputs.join(", "))?;
        if let Some(name) = &self.name {
            write!(f, " \"{}\"", name)?;
        }
        if let Some(function) = &self.function {
            write!(f, " {}", function)?;
        }
        if let Some(window) = &self.window {
            write!(f, " over {}", window)?;
        }
        write!(f, ": {}", self.output_type)
    }
}

use crate::expr::Expr;
use crate::operator::{Operator, OperatorId, OperatorKind};
use crate::types::Type;
use common::CompilerError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named local value shared by reference between operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub value: Expr,
}

/// DAG of operators plus the local declarations they reference.
///
/// Circuits only grow: operators and declarations are appended, never removed or changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    name: String,
    declarations: Vec<Declaration>,
    operators: Vec<Operator>,
    /// Source operators, one per table.
    inputs: Vec<OperatorId>,
    /// Sink operators, one per view.
    outputs: Vec<OperatorId>,
    /// Counter behind fresh local names.
    next_local: usize,
}

impl Circuit {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            declarations: Vec::new(),
            operators: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            next_local: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds an operator and returns its id.
    ///
    /// The id and the multiset flag are assigned here. Sources are recorded as inputs and sinks as
    /// outputs.
    ///
    /// # Arguments
    ///
    /// * `op` - Operator to add; its inputs must already be in the circuit.
    pub fn add_operator(&mut self, mut op: Operator) -> Result<OperatorId, CompilerError> {
        if !op.kind.arity().accepts(op.inputs.len()) {
            return Err(CompilerError::TranslationError(format!(
                "{} operator with {} inputs",
                op.kind,
                op.inputs.len()
            )));
        }
        if op.kind.has_function() && op.function.is_none() {
            return Err(CompilerError::TranslationError(format!(
                "{} operator without a function",
                op.kind
            )));
        }
        let mut flags = Vec::with_capacity(op.inputs.len());
        for input in op.inputs.iter() {
            let source = self.operator(*input).ok_or_else(|| {
                CompilerError::TranslationError(format!("unknown input {}", input))
            })?;
            flags.push(source.is_multiset);
        }
        let id = OperatorId(self.operators.len());
        op.id = id;
        op.is_multiset = op.kind.output_multiset(&flags);
        match op.kind {
            OperatorKind::Source => self.inputs.push(id),
            OperatorKind::Sink => self.outputs.push(id),
            _ => (),
        }
        debug!("Adding operator {}", op);
        self.operators.push(op);
        Ok(id)
    }

    /// Binds `value` to a fresh name starting with `prefix` and returns a reference to it.
    ///
    /// Identical values are not shared automatically; every call creates a new name.
    pub fn declare_local(&mut self, prefix: &str, value: Expr) -> Expr {
        let name = format!("{}_{}", prefix, self.next_local);
        self.next_local += 1;
        let ty = value.ty();
        trace!("Declaring {} = {}", name, value);
        self.declarations.push(Declaration {
            name: name.clone(),
            value,
        });
        Expr::var(&name, ty)
    }

    /// The most recent operator carrying `name`: a source, sink or no-op of that table or view.
    pub fn get_operator(&self, name: &str) -> Option<&Operator> {
        self.operators
            .iter()
            .rev()
            .find(|op| op.name.as_ref().map_or(false, |n| n == name))
    }

    pub fn operator(&self, id: OperatorId) -> Option<&Operator> {
        self.operators.get(id.0)
    }

    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    pub fn inputs(&self) -> &[OperatorId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OperatorId] {
        &self.outputs
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// Value of a local declaration.
    pub fn declaration(&self, name: &str) -> Option<&Expr> {
        self.declarations
            .iter()
            .find(|d| d.name == name)
            .map(|d| &d.value)
    }

    /// Follows references to local declarations until reaching a value.
    pub fn resolve<'a>(&'a self, mut expr: &'a Expr) -> &'a Expr {
        while let Expr::Var { name, .. } = expr {
            match self.declaration(name) {
                Some(value) => expr = value,
                None => break,
            }
        }
        expr
    }

    /// Element type of the stream an operator produces.
    pub fn stream_type(&self, id: OperatorId) -> Option<&Type> {
        self.operator(id).map(|op| &op.output_type)
    }

    pub fn to_json(&self) -> Result<String, CompilerError> {
        serde_json::to_string_pretty(self).map_err(|e| CompilerError::IOError(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, CompilerError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, CompilerError> {
        serde_cbor::to_vec(self).map_err(|e| CompilerError::IOError(e.to_string()))
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, CompilerError> {
        serde_cbor::from_slice(bytes).map_err(|e| CompilerError::ParseError(e.to_string()))
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "circuit {} {{", self.name)?;
        for d in self.declarations.iter() {
            writeln!(f, "    let {} = {};", d.name, d.value)?;
        }
        for op in self.operators.iter() {
            writeln!(f, "    {}", op)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::expr::Param;
    use common::Field;

    fn row() -> Type {
        Type::Tuple(vec![Type::i64(false)])
    }

    fn source(c: &mut Circuit, name: &str) -> OperatorId {
        c.add_operator(Operator::new(OperatorKind::Source, None, Type::zset(row()), vec![]).with_name(name))
            .unwrap()
    }

    #[test]
    fn test_declare_local_fresh_names() {
        let mut c = Circuit::new("c");
        let a = c.declare_local("map", Expr::bool(true));
        let b = c.declare_local("map", Expr::bool(true));
        assert_ne!(a, b);
        match (&a, &b) {
            (Expr::Var { name: x, .. }, Expr::Var { name: y, .. }) => {
                assert!(x.starts_with("map_"));
                assert!(y.starts_with("map_"));
            }
            _ => panic!("expected variables"),
        }
        assert_eq!(c.declarations().len(), 2);
        assert_eq!(c.resolve(&a), &Expr::bool(true));
    }

    #[test]
    fn test_multiset_flags() {
        let mut c = Circuit::new("c");
        let s = source(&mut c, "T");
        assert!(!c.operator(s).unwrap().is_multiset);
        let t = Expr::var("t", row());
        let f = c.declare_local("map", t.clone().closure(vec![t.as_param()]));
        let m = c
            .add_operator(Operator::new(OperatorKind::Map, Some(f), Type::zset(row()), vec![s]))
            .unwrap();
        assert!(c.operator(m).unwrap().is_multiset);
        let n = c
            .add_operator(Operator::new(OperatorKind::Negate, None, Type::zset(row()), vec![m]))
            .unwrap();
        assert!(c.operator(n).unwrap().is_multiset);
        let d = c
            .add_operator(Operator::new(OperatorKind::Distinct, None, Type::zset(row()), vec![n]))
            .unwrap();
        assert!(!c.operator(d).unwrap().is_multiset);
        let sum = c
            .add_operator(Operator::new(OperatorKind::Sum, None, Type::zset(row()), vec![s, d]))
            .unwrap();
        assert!(!c.operator(sum).unwrap().is_multiset);
        assert_eq!(c.inputs(), &[s]);
    }

    #[test]
    fn test_arity_checked() {
        let mut c = Circuit::new("c");
        let s = source(&mut c, "T");
        let bad = Operator::new(OperatorKind::Subtract, None, Type::zset(row()), vec![s]);
        assert!(c.add_operator(bad).is_err());
        let unknown = Operator::new(OperatorKind::Negate, None, Type::zset(row()), vec![OperatorId(9)]);
        assert!(c.add_operator(unknown).is_err());
        let no_function = Operator::new(OperatorKind::Map, None, Type::zset(row()), vec![s]);
        assert!(c.add_operator(no_function).is_err());
    }

    #[test]
    fn test_get_operator_by_name() {
        let mut c = Circuit::new("c");
        let s = source(&mut c, "T");
        let sink = c
            .add_operator(Operator::new(OperatorKind::Sink, None, Type::zset(row()), vec![s]).with_name("V"))
            .unwrap();
        assert_eq!(c.get_operator("T").map(|o| o.id), Some(s));
        assert_eq!(c.get_operator("V").map(|o| o.id), Some(sink));
        assert!(c.get_operator("W").is_none());
        assert_eq!(c.outputs(), &[sink]);
    }

    #[test]
    fn test_serialization() {
        let mut c = Circuit::new("c");
        let s = source(&mut c, "T");
        let lit = Expr::ZSetLiteral {
            rows: vec![(Expr::Tuple(vec![Expr::literal(Field::double(1.5), Type::f64(false))]), 1)],
            element_type: Type::Tuple(vec![Type::f64(false)]),
        };
        let k = c
            .add_operator(Operator::new(OperatorKind::Constant, Some(lit), Type::zset(row()), vec![]))
            .unwrap();
        let p = Param::new("x", Type::Any);
        let f = c.declare_local("f", Expr::var("x", Type::Any).closure(vec![p]));
        c.add_operator(Operator::new(OperatorKind::Map, Some(f), Type::zset(row()), vec![s]))
            .unwrap();
        let json = c.to_json().unwrap();
        assert_eq!(Circuit::from_json(&json).unwrap(), c);
        let cbor = c.to_cbor().unwrap();
        assert_eq!(Circuit::from_cbor(&cbor).unwrap(), c);
        assert!(c.to_string().contains(&format!("{} = Constant()", k)));
    }
}

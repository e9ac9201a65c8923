use crate::sqllib;
use crate::value::Value;
use circuit::{Circuit, Expr, Param, Statement};
use common::CompilerError;
use std::cmp::Ordering;

fn error(message: String) -> CompilerError {
    CompilerError::ExecutionError(message)
}

/// Variables bound while evaluating a closure body, innermost last.
#[derive(Debug, Default)]
struct Env {
    bindings: Vec<(String, Value)>,
}

impl Env {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.bindings
            .iter_mut()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// Evaluates closures and folds of a circuit. Free variables resolve to the circuit's
/// local declarations.
pub struct Evaluator<'a> {
    circuit: &'a Circuit,
}

impl<'a> Evaluator<'a> {
    pub fn new(circuit: &'a Circuit) -> Self {
        Self { circuit }
    }

    /// Follows declaration references to the closure `function` denotes.
    fn closure(&self, function: &'a Expr) -> Result<(&'a [Param], &'a Expr), CompilerError> {
        match self.circuit.resolve(function) {
            Expr::Closure { params, body } => Ok((params, body)),
            other => Err(error(format!("{} is not a closure", other))),
        }
    }

    /// Calls the closure `function` with `args`.
    pub fn call(&self, function: &'a Expr, args: Vec<Value>) -> Result<Value, CompilerError> {
        let (params, body) = self.closure(function)?;
        if params.len() != args.len() {
            return Err(error(format!(
                "closure with {} parameters called with {} arguments",
                params.len(),
                args.len()
            )));
        }
        let mut env = Env {
            bindings: params
                .iter()
                .map(|p| p.name.clone())
                .zip(args.into_iter())
                .collect(),
        };
        self.eval_in(body, &mut env)
    }

    /// Evaluates an expression without free variables other than declarations.
    pub fn eval(&self, expr: &'a Expr) -> Result<Value, CompilerError> {
        self.eval_in(expr, &mut Env::default())
    }

    fn eval_all(&self, exprs: &'a [Expr], env: &mut Env) -> Result<Vec<Value>, CompilerError> {
        let mut values = Vec::with_capacity(exprs.len());
        for e in exprs {
            values.push(self.eval_in(e, env)?);
        }
        Ok(values)
    }

    fn eval_in(&self, expr: &'a Expr, env: &mut Env) -> Result<Value, CompilerError> {
        match expr {
            Expr::Literal { value, .. } => Ok(Value::Scalar(value.clone())),
            Expr::Var { name, .. } => {
                if let Some(v) = env.lookup(name) {
                    return Ok(v.clone());
                }
                match self.circuit.declaration(name) {
                    Some(value) => self.eval(value),
                    None => Err(error(format!("unbound variable {}", name))),
                }
            }
            Expr::Field { expr, index } => Ok(self.eval_in(expr, env)?.field(*index)?.clone()),
            Expr::Tuple(fields) | Expr::RawTuple(fields) => {
                Ok(Value::Tuple(self.eval_all(fields, env)?))
            }
            Expr::Binary {
                op,
                left,
                right,
                ty,
            } => {
                let l = self.eval_in(left, env)?.into_field()?;
                let r = self.eval_in(right, env)?.into_field()?;
                sqllib::cast(Value::Scalar(sqllib::binary(*op, &l, &r)?), ty)
            }
            Expr::Unary { op, operand, ty } => {
                let v = self.eval_in(operand, env)?.into_field()?;
                sqllib::cast(Value::Scalar(sqllib::unary(*op, &v)?), ty)
            }
            Expr::Cast { expr, ty } => sqllib::cast(self.eval_in(expr, env)?, ty),
            Expr::If {
                condition,
                then,
                otherwise,
            } => {
                let c = self.eval_in(condition, env)?;
                if c == Value::bool(true) {
                    self.eval_in(then, env)
                } else {
                    self.eval_in(otherwise, env)
                }
            }
            Expr::Apply { function, args, .. } => {
                let args = self.eval_all(args, env)?;
                sqllib::apply(function, args)
            }
            Expr::Call { callee, args, .. } => {
                let args = self.eval_all(args, env)?;
                self.call(callee, args)
            }
            Expr::Block { statements, result } => {
                let depth = env.bindings.len();
                for statement in statements {
                    match statement {
                        Statement::Let { name, value } => {
                            let v = self.eval_in(value, env)?;
                            env.bindings.push((name.clone(), v));
                        }
                        Statement::FieldAssign { var, index, value } => {
                            let v = self.eval_in(value, env)?;
                            let target = env
                                .lookup_mut(var)
                                .ok_or_else(|| error(format!("unbound variable {}", var)))?;
                            *target.field_mut(*index)? = v;
                        }
                    }
                }
                let value = self.eval_in(result, env);
                env.bindings.truncate(depth);
                value
            }
            Expr::VecLiteral { elements, .. } => Ok(Value::Vector(self.eval_all(elements, env)?)),
            Expr::SortBy { vec, comparator } => {
                let mut elements = self.eval_in(vec, env)?.into_vector()?;
                let mut failure = None;
                elements.sort_by(|a, b| match self.compare(comparator, a, b) {
                    Ok(ordering) => ordering,
                    Err(e) => {
                        failure.get_or_insert(e);
                        Ordering::Equal
                    }
                });
                match failure {
                    Some(e) => Err(e),
                    None => Ok(Value::Vector(elements)),
                }
            }
            Expr::Closure { .. }
            | Expr::Fold { .. }
            | Expr::Extract(_)
            | Expr::Rev(_)
            | Expr::Then(_, _)
            | Expr::RelRange { .. }
            | Expr::RelOffset { .. }
            | Expr::ZSetLiteral { .. } => Err(error(format!("{} is not a row value", expr))),
        }
    }

    /// Orders two values with a comparator built from Extract, Rev and Then.
    pub fn compare(&self, comparator: &'a Expr, a: &Value, b: &Value) -> Result<Ordering, CompilerError> {
        match self.circuit.resolve(comparator) {
            Expr::Extract(key) => {
                let ka = self.call(key, vec![a.clone()])?;
                let kb = self.call(key, vec![b.clone()])?;
                Ok(ka.cmp(&kb))
            }
            Expr::Rev(inner) => Ok(self.compare(inner, a, b)?.reverse()),
            Expr::Then(first, second) => match self.compare(first, a, b)? {
                Ordering::Equal => self.compare(second, a, b),
                ordering => Ok(ordering),
            },
            other => Err(error(format!("{} is not a comparator", other))),
        }
    }

    /// Folds weighted rows: `zero`, then `increment(acc, row, weight)` per row, then the
    /// post-processing step if the fold has one.
    pub fn fold(&self, fold: &'a Expr, rows: &[(Value, i64)]) -> Result<Value, CompilerError> {
        let (zero, increment, postprocess) = match self.circuit.resolve(fold) {
            Expr::Fold {
                zero,
                increment,
                postprocess,
            } => (zero, increment, postprocess),
            other => return Err(error(format!("{} is not a fold", other))),
        };
        let mut acc = self.eval(zero)?;
        for (row, weight) in rows {
            acc = self.call(increment, vec![acc, row.clone(), Value::int(*weight)])?;
        }
        match postprocess {
            Some(post) => self.call(post, vec![acc]),
            None => Ok(acc),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use circuit::{BinaryOp, Type};
    use common::Field;

    fn add_one() -> Expr {
        let x = Expr::var("x", Type::i64(false));
        Expr::binary(BinaryOp::Add, x.clone(), Expr::int(1, Type::i64(false)), Type::i64(false))
            .closure(vec![x.as_param()])
    }

    #[test]
    fn test_call_declared_closure() {
        let mut circuit = Circuit::new("eval");
        let f = circuit.declare_local("f", add_one());
        let e = Evaluator::new(&circuit);
        assert_eq!(e.call(&f, vec![Value::int(41)]).unwrap(), Value::int(42));
        assert!(e.call(&f, vec![]).is_err());
    }

    #[test]
    fn test_block_field_assign() {
        let circuit = Circuit::new("eval");
        let a = Expr::var("a", Type::RawTuple(vec![Type::i64(false), Type::i64(false)]));
        let body = Expr::Block {
            statements: vec![Statement::FieldAssign {
                var: String::from("a"),
                index: 1,
                value: Expr::int(7, Type::i64(false)),
            }],
            result: Box::new(a.clone()),
        };
        let f = body.closure(vec![a.as_param()]);
        let e = Evaluator::new(&circuit);
        let result = e
            .call(&f, vec![Value::Tuple(vec![Value::int(1), Value::int(2)])])
            .unwrap();
        assert_eq!(result, Value::Tuple(vec![Value::int(1), Value::int(7)]));
    }

    #[test]
    fn test_fold_with_weights() {
        let circuit = Circuit::new("eval");
        let ty = Type::i64(false);
        let a = Expr::var("a", ty.clone());
        let v = Expr::var("v", ty.clone());
        let w = Expr::var("w", Type::Weight);
        let weighted = Expr::binary(BinaryOp::Mul, v.clone(), w.clone().cast(&ty), ty.clone());
        let increment = Expr::binary(BinaryOp::Add, a.clone(), weighted, ty.clone())
            .closure(vec![a.as_param(), v.as_param(), w.as_param()]);
        let fold = Expr::Fold {
            zero: Box::new(Expr::int(0, ty)),
            increment: Box::new(increment),
            postprocess: None,
        };
        let e = Evaluator::new(&circuit);
        let rows = vec![(Value::int(3), 2), (Value::int(5), -1)];
        assert_eq!(e.fold(&fold, &rows).unwrap(), Value::int(1));
    }

    #[test]
    fn test_sort_by_comparator() {
        let circuit = Circuit::new("eval");
        let row = Type::Tuple(vec![Type::i64(false), Type::i64(false)]);
        let t = Expr::var("t", row.clone());
        let by_first = Expr::Extract(Box::new(t.field(0).closure(vec![t.as_param()])));
        let by_second = Expr::Rev(Box::new(Expr::Extract(Box::new(
            t.field(1).closure(vec![t.as_param()]),
        ))));
        let rows = vec![(1, 1), (0, 5), (1, 3)]
            .into_iter()
            .map(|(a, b)| Value::row(vec![Field::IntField(a), Field::IntField(b)]))
            .collect::<Vec<_>>();
        let literal = Expr::VecLiteral {
            elements: rows
                .iter()
                .map(|r| match r {
                    Value::Tuple(f) => Expr::Tuple(
                        f.iter()
                            .map(|v| Expr::literal(v.as_field().unwrap().clone(), Type::i64(false)))
                            .collect(),
                    ),
                    _ => unreachable!(),
                })
                .collect(),
            element_type: row,
        };
        let sort = Expr::SortBy {
            vec: Box::new(literal),
            comparator: Box::new(Expr::Then(Box::new(by_first), Box::new(by_second))),
        };
        let e = Evaluator::new(&circuit);
        let sorted = e.eval(&sort).unwrap();
        assert_eq!(sorted, Value::Vector(vec![rows[1].clone(), rows[2].clone(), rows[0].clone()]));
    }

    #[test]
    fn test_non_values_rejected() {
        let circuit = Circuit::new("eval");
        let e = Evaluator::new(&circuit);
        assert!(e.eval(&add_one()).is_err());
        assert!(e.eval(&Expr::var("nowhere", Type::Any)).is_err());
    }
}

use crate::eval::Evaluator;
use crate::value::Value;
use crate::zset::ZSet;
use circuit::{Circuit, Expr, Operator, OperatorId, OperatorKind};
use common::CompilerError;
use std::collections::{BTreeMap, HashMap};

fn error(message: String) -> CompilerError {
    CompilerError::ExecutionError(message)
}

/// Frame end relative to the current order value.
struct Offset {
    before: bool,
    distance: i64,
}

impl Offset {
    fn apply(&self, order: i64) -> i64 {
        if self.before {
            order.saturating_sub(self.distance)
        } else {
            order.saturating_add(self.distance)
        }
    }
}

/// Runs a circuit one step at a time.
///
/// Every step feeds each source with the current contents of its table and produces the
/// current contents of every view. Operators that bridge to the incremental domain keep their
/// state between steps.
pub struct CircuitRunner<'a> {
    circuit: &'a Circuit,
    evaluator: Evaluator<'a>,
    /// Previous input of each Differential, running sum of each Integral, and accumulated input
    /// of each incremental aggregate.
    state: HashMap<OperatorId, ZSet>,
    /// Last full output of each incremental aggregate.
    emitted: HashMap<OperatorId, ZSet>,
    /// Outputs of the last step, by operator id.
    outputs: Vec<ZSet>,
}

impl<'a> CircuitRunner<'a> {
    pub fn new(circuit: &'a Circuit) -> Self {
        Self {
            circuit,
            evaluator: Evaluator::new(circuit),
            state: HashMap::new(),
            emitted: HashMap::new(),
            outputs: Vec::new(),
        }
    }

    /// Output of operator `id` in the last step.
    pub fn output_of(&self, id: OperatorId) -> Option<&ZSet> {
        self.outputs.get(id.0)
    }

    /// Evaluates every operator once.
    ///
    /// # Arguments
    ///
    /// * `inputs` - Contents of each table, by table name. Missing tables are empty.
    ///
    /// Returns the contents of every sink, by view name.
    pub fn step(&mut self, inputs: &HashMap<String, ZSet>) -> Result<HashMap<String, ZSet>, CompilerError> {
        let circuit = self.circuit;
        let mut outputs: Vec<ZSet> = Vec::with_capacity(circuit.operators().len());
        for op in circuit.operators() {
            let result = self
                .evaluate(op, inputs, &outputs)
                .map_err(|e| error(format!("{}: {}", op.id, e)))?;
            trace!("{} produced {} rows", op.id, result.len());
            outputs.push(result);
        }
        let mut views = HashMap::new();
        for id in circuit.outputs() {
            if let (Some(op), Some(result)) = (circuit.operator(*id), outputs.get(id.0)) {
                if let Some(name) = &op.name {
                    views.insert(name.clone(), result.clone());
                }
            }
        }
        self.outputs = outputs;
        debug!("Step produced {} views", views.len());
        Ok(views)
    }

    fn function(op: &'a Operator) -> Result<&'a Expr, CompilerError> {
        op.function
            .as_ref()
            .ok_or_else(|| error(format!("{} has no function", op.kind)))
    }

    /// Arguments of a per-row closure: `(key, value)` for indexed streams, else the row.
    fn row_args(&self, input: OperatorId, row: &Value) -> Result<Vec<Value>, CompilerError> {
        let indexed = self
            .circuit
            .stream_type(input)
            .map_or(false, |t| t.key_value().is_some());
        if indexed {
            let (k, v) = row.split_pair()?;
            Ok(vec![k.clone(), v.clone()])
        } else {
            Ok(vec![row.clone()])
        }
    }

    fn evaluate(
        &mut self,
        op: &'a Operator,
        tables: &HashMap<String, ZSet>,
        done: &[ZSet],
    ) -> Result<ZSet, CompilerError> {
        let mut inputs = Vec::with_capacity(op.inputs.len());
        for id in op.inputs.iter() {
            inputs.push(
                done.get(id.0)
                    .ok_or_else(|| error(format!("input {} not evaluated", id)))?,
            );
        }
        let first = || {
            inputs
                .first()
                .copied()
                .ok_or_else(|| error(format!("{} without input", op.kind)))
        };
        let result = match op.kind {
            OperatorKind::Source => op
                .name
                .as_ref()
                .and_then(|name| tables.get(name))
                .cloned()
                .unwrap_or_default(),
            OperatorKind::Sink | OperatorKind::Noop => first()?.clone(),
            OperatorKind::Constant => self.constant(Self::function(op)?)?,
            OperatorKind::Map | OperatorKind::Index => {
                let f = Self::function(op)?;
                let mut result = ZSet::new();
                for (row, weight) in first()?.iter() {
                    let args = self.row_args(op.inputs[0], row)?;
                    result.insert(self.evaluator.call(f, args)?, weight);
                }
                result
            }
            OperatorKind::Filter => {
                let f = Self::function(op)?;
                let mut result = ZSet::new();
                for (row, weight) in first()?.iter() {
                    let args = self.row_args(op.inputs[0], row)?;
                    if self.evaluator.call(f, args)? == Value::bool(true) {
                        result.insert(row.clone(), weight);
                    }
                }
                result
            }
            OperatorKind::FlatMap => {
                let f = Self::function(op)?;
                let mut result = ZSet::new();
                for (row, weight) in first()?.iter() {
                    let args = self.row_args(op.inputs[0], row)?;
                    for element in self.evaluator.call(f, args)?.into_vector()? {
                        result.insert(element, weight);
                    }
                }
                result
            }
            OperatorKind::Join => {
                let f = Self::function(op)?;
                let (left, right) = match inputs.as_slice() {
                    [l, r] => (l.group_by_key()?, r.group_by_key()?),
                    _ => return Err(error(String::from("join needs two inputs"))),
                };
                let mut result = ZSet::new();
                for (key, left_rows) in left.iter() {
                    if let Some(right_rows) = right.get(key) {
                        for (l, lw) in left_rows {
                            for (r, rw) in right_rows {
                                let args = vec![key.clone(), l.clone(), r.clone()];
                                result.insert(self.evaluator.call(f, args)?, lw * rw);
                            }
                        }
                    }
                }
                result
            }
            OperatorKind::Aggregate => self.aggregate(Self::function(op)?, first()?)?,
            OperatorKind::IncrementalAggregate => {
                let delta = first()?.clone();
                let f = Self::function(op)?;
                self.integrate_and_diff(op.id, &delta, |runner, all| runner.aggregate(f, all))?
            }
            OperatorKind::WindowAggregate => {
                let delta = first()?.clone();
                let f = Self::function(op)?;
                let window = op
                    .window
                    .as_ref()
                    .ok_or_else(|| error(String::from("window aggregate without a window")))?;
                self.integrate_and_diff(op.id, &delta, |runner, all| runner.window(f, window, all))?
            }
            OperatorKind::Distinct => first()?.distinct(),
            OperatorKind::Sum => {
                let mut result = ZSet::new();
                for input in inputs.iter() {
                    result = result.plus(input);
                }
                result
            }
            OperatorKind::Subtract => match inputs.as_slice() {
                [a, b] => a.minus(b),
                _ => return Err(error(String::from("subtract needs two inputs"))),
            },
            OperatorKind::Negate => first()?.negate(),
            OperatorKind::Differential => {
                let current = first()?.clone();
                let previous = self.state.insert(op.id, current.clone()).unwrap_or_default();
                current.minus(&previous)
            }
            OperatorKind::Integral => {
                let sum = self.state.remove(&op.id).unwrap_or_default().plus(first()?);
                self.state.insert(op.id, sum.clone());
                sum
            }
        };
        Ok(result)
    }

    fn constant(&self, function: &'a Expr) -> Result<ZSet, CompilerError> {
        match self.circuit.resolve(function) {
            Expr::ZSetLiteral { rows, .. } => {
                let mut result = ZSet::new();
                for (row, weight) in rows {
                    result.insert(self.evaluator.eval(row)?, *weight);
                }
                Ok(result)
            }
            other => Err(error(format!("{} is not a Z-set literal", other))),
        }
    }

    /// Adds `delta` to the accumulated input of `id`, recomputes the full output and returns its
    /// change since the last step.
    fn integrate_and_diff<F>(&mut self, id: OperatorId, delta: &ZSet, compute: F) -> Result<ZSet, CompilerError>
    where
        F: Fn(&Self, &ZSet) -> Result<ZSet, CompilerError>,
    {
        let all = self.state.remove(&id).unwrap_or_default().plus(delta);
        let current = compute(self, &all)?;
        self.state.insert(id, all);
        let previous = self.emitted.insert(id, current.clone()).unwrap_or_default();
        Ok(current.minus(&previous))
    }

    /// One `(key, fold result)` pair per key with rows.
    fn aggregate(&self, fold: &'a Expr, input: &ZSet) -> Result<ZSet, CompilerError> {
        let mut result = ZSet::new();
        for (key, rows) in input.group_by_key()? {
            let value = self.evaluator.fold(fold, &rows)?;
            result.insert(Value::pair(key, value), 1);
        }
        Ok(result)
    }

    fn offset(&self, expr: &'a Expr) -> Result<Offset, CompilerError> {
        match self.circuit.resolve(expr) {
            Expr::RelOffset { before, value } => {
                let distance = self.evaluator.eval(value)?.into_field()?;
                let distance = distance
                    .as_int()
                    .ok_or_else(|| error(format!("window offset {}", distance)))?;
                Ok(Offset {
                    before: *before,
                    distance,
                })
            }
            other => Err(error(format!("{} is not a window offset", other))),
        }
    }

    /// Folds, for every partition and order value present, the rows whose order value lies in
    /// the frame around it. Input values are `(order, row)` pairs; the output key is
    /// `(partition, order)`.
    fn window(&self, fold: &'a Expr, window: &'a Expr, input: &ZSet) -> Result<ZSet, CompilerError> {
        let (lower, upper) = match self.circuit.resolve(window) {
            Expr::RelRange { lower, upper } => (self.offset(lower)?, self.offset(upper)?),
            other => return Err(error(format!("{} is not a window", other))),
        };
        let mut result = ZSet::new();
        for (partition, rows) in input.group_by_key()? {
            let mut by_order: BTreeMap<i64, (Value, Vec<(Value, i64)>)> = BTreeMap::new();
            for (value, weight) in rows {
                let order = value.field(0)?.clone();
                let position = order
                    .as_field()?
                    .as_int()
                    .ok_or_else(|| error(format!("window ordered by {}", order)))?;
                let row = value.field(1)?.clone();
                by_order
                    .entry(position)
                    .or_insert_with(|| (order, Vec::new()))
                    .1
                    .push((row, weight));
            }
            for (position, (order, _)) in by_order.iter() {
                let (from, to) = (lower.apply(*position), upper.apply(*position));
                if from > to {
                    continue;
                }
                let frame: Vec<(Value, i64)> = by_order
                    .range(from..=to)
                    .flat_map(|(_, (_, rows))| rows.iter().cloned())
                    .collect();
                let value = self.evaluator.fold(fold, &frame)?;
                let key = Value::Tuple(vec![partition.clone(), order.clone()]);
                result.insert(Value::pair(key, value), 1);
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use circuit::{BinaryOp, Type};
    use common::Field;

    fn row_type() -> Type {
        Type::Tuple(vec![Type::i64(false), Type::i64(false)])
    }

    fn rows(data: &[(i64, i64, i64)]) -> ZSet {
        ZSet::from_rows(
            data.iter()
                .map(|(a, b, w)| (Value::row(vec![Field::IntField(*a), Field::IntField(*b)]), *w)),
        )
    }

    fn source(circuit: &mut Circuit) -> OperatorId {
        circuit
            .add_operator(Operator::new(OperatorKind::Source, None, Type::zset(row_type()), vec![]).with_name("t"))
            .unwrap()
    }

    fn sink(circuit: &mut Circuit, input: OperatorId, ty: Type) {
        circuit
            .add_operator(Operator::new(OperatorKind::Sink, None, ty, vec![input]).with_name("v"))
            .unwrap();
    }

    fn sum_fold(circuit: &mut Circuit) -> Expr {
        let ty = Type::i64(false);
        let a = Expr::var("a", ty.clone());
        let v = Expr::var("v", row_type());
        let w = Expr::var("w", Type::Weight);
        let weighted = Expr::binary(BinaryOp::Mul, v.field(1), w.clone().cast(&ty), ty.clone());
        let increment = Expr::binary(BinaryOp::Add, a.clone(), weighted, ty.clone())
            .closure(vec![a.as_param(), v.as_param(), w.as_param()]);
        let fold = Expr::Fold {
            zero: Box::new(Expr::int(0, ty)),
            increment: Box::new(increment),
            postprocess: None,
        };
        circuit.declare_local("folder", fold)
    }

    fn index_by_first(circuit: &mut Circuit, input: OperatorId) -> OperatorId {
        let t = Expr::var("t", row_type());
        let index = circuit.declare_local(
            "index",
            Expr::RawTuple(vec![t.field(0), t.clone()]).closure(vec![t.as_param()]),
        );
        circuit
            .add_operator(Operator::new(
                OperatorKind::Index,
                Some(index),
                Type::indexed_zset(Type::i64(false), row_type()),
                vec![input],
            ))
            .unwrap()
    }

    fn inputs(z: ZSet) -> HashMap<String, ZSet> {
        let mut m = HashMap::new();
        m.insert(String::from("t"), z);
        m
    }

    #[test]
    fn test_aggregate_per_key() {
        let mut circuit = Circuit::new("run");
        let s = source(&mut circuit);
        let i = index_by_first(&mut circuit, s);
        let fold = sum_fold(&mut circuit);
        let out = Type::indexed_zset(Type::i64(false), Type::i64(false));
        let a = circuit
            .add_operator(Operator::new(OperatorKind::Aggregate, Some(fold), out.clone(), vec![i]))
            .unwrap();
        sink(&mut circuit, a, out);
        let mut runner = CircuitRunner::new(&circuit);
        let views = runner.step(&inputs(rows(&[(1, 2, 1), (1, 3, 2), (2, 5, 1)]))).unwrap();
        let expected = ZSet::from_rows(vec![
            (Value::pair(Value::int(1), Value::int(8)), 1),
            (Value::pair(Value::int(2), Value::int(5)), 1),
        ]);
        assert_eq!(views["v"], expected);
    }

    #[test]
    fn test_incremental_aggregate_matches_batch() {
        let mut circuit = Circuit::new("run");
        let s = source(&mut circuit);
        let i = index_by_first(&mut circuit, s);
        let indexed = circuit.stream_type(i).cloned().unwrap();
        let fold = sum_fold(&mut circuit);
        let out = Type::indexed_zset(Type::i64(false), Type::i64(false));
        let d = circuit
            .add_operator(Operator::new(OperatorKind::Differential, None, indexed, vec![i]))
            .unwrap();
        let a = circuit
            .add_operator(Operator::new(OperatorKind::IncrementalAggregate, Some(fold), out.clone(), vec![d]))
            .unwrap();
        let g = circuit
            .add_operator(Operator::new(OperatorKind::Integral, None, out.clone(), vec![a]))
            .unwrap();
        sink(&mut circuit, g, out);
        let mut runner = CircuitRunner::new(&circuit);
        runner.step(&inputs(rows(&[(1, 2, 1)]))).unwrap();
        let views = runner.step(&inputs(rows(&[(1, 2, 1), (1, 4, 1)]))).unwrap();
        assert_eq!(
            views["v"],
            ZSet::from_rows(vec![(Value::pair(Value::int(1), Value::int(6)), 1)])
        );
        let views = runner.step(&inputs(ZSet::new())).unwrap();
        assert!(views["v"].is_empty());
    }

    #[test]
    fn test_window_frames() {
        let mut circuit = Circuit::new("run");
        let s = source(&mut circuit);
        // Partition on nothing; order by the first column.
        let t = Expr::var("t", row_type());
        let map = circuit.declare_local(
            "map",
            Expr::RawTuple(vec![
                Expr::Tuple(vec![]),
                Expr::RawTuple(vec![t.field(0), t.clone()]),
            ])
            .closure(vec![t.as_param()]),
        );
        let value_type = Type::RawTuple(vec![Type::i64(false), row_type()]);
        let indexed_type = Type::indexed_zset(Type::Tuple(vec![]), value_type);
        let i = circuit
            .add_operator(Operator::new(OperatorKind::Index, Some(map), indexed_type, vec![s]))
            .unwrap();
        let fold = sum_fold(&mut circuit);
        let window = circuit.declare_local(
            "window",
            Expr::RelRange {
                lower: Box::new(Expr::RelOffset {
                    before: true,
                    value: Box::new(Expr::int(1, Type::i64(false))),
                }),
                upper: Box::new(Expr::RelOffset {
                    before: false,
                    value: Box::new(Expr::int(0, Type::i64(false))),
                }),
            },
        );
        let out = Type::indexed_zset(Type::Any, Type::i64(false));
        let w = circuit
            .add_operator(
                Operator::new(OperatorKind::WindowAggregate, Some(fold), out.clone(), vec![i])
                    .with_window(window),
            )
            .unwrap();
        sink(&mut circuit, w, out);
        let mut runner = CircuitRunner::new(&circuit);
        let views = runner
            .step(&inputs(rows(&[(1, 10, 1), (2, 20, 1), (4, 40, 1)])))
            .unwrap();
        let key = |o: i64| Value::Tuple(vec![Value::Tuple(vec![]), Value::int(o)]);
        let expected = ZSet::from_rows(vec![
            (Value::pair(key(1), Value::int(10)), 1),
            (Value::pair(key(2), Value::int(30)), 1),
            (Value::pair(key(4), Value::int(40)), 1),
        ]);
        assert_eq!(views["v"], expected);
    }

    #[test]
    fn test_differential_and_integral() {
        let mut circuit = Circuit::new("run");
        let s = source(&mut circuit);
        let ty = Type::zset(row_type());
        let d = circuit
            .add_operator(Operator::new(OperatorKind::Differential, None, ty.clone(), vec![s]))
            .unwrap();
        let i = circuit
            .add_operator(Operator::new(OperatorKind::Integral, None, ty.clone(), vec![d]))
            .unwrap();
        sink(&mut circuit, i, ty);
        let mut runner = CircuitRunner::new(&circuit);
        runner.step(&inputs(rows(&[(1, 1, 1)]))).unwrap();
        let views = runner.step(&inputs(rows(&[(2, 2, 1)]))).unwrap();
        assert_eq!(views["v"], rows(&[(2, 2, 1)]));
        assert_eq!(runner.output_of(d).unwrap(), &rows(&[(1, 1, -1), (2, 2, 1)]));
    }
}

//! Lowering of relational plans into circuits.

mod sort;
mod window;

use crate::aggregate::create_folding_function;
use crate::expression::{wrap_bool_if_needed, ExpressionCompiler, SqlExpressionCompiler};
use crate::join_condition::JoinConditionAnalyzer;
use crate::options::CompilerOptions;
use circuit::{BinaryOp, Circuit, Expr, Operator, OperatorId, OperatorKind, Type};
use common::catalog::Catalog;
use common::logical_plan::*;
use common::table::Table;
use common::{CompilerError, TableSchema};
use std::collections::HashMap;

/// Tuple type of the rows described by `schema`.
pub fn row_type(schema: &TableSchema) -> Type {
    Type::Tuple(schema.types().into_iter().map(Type::from_sql).collect())
}

/// Adds a source reading `table`. The statement that created the table becomes its comment.
pub fn add_source(circuit: &mut Circuit, table: &Table) -> Result<OperatorId, CompilerError> {
    let op = Operator::new(
        OperatorKind::Source,
        None,
        Type::zset(row_type(&table.schema)),
        vec![],
    )
    .with_name(&table.name)
    .with_comment(table.statement.clone());
    circuit.add_operator(op)
}

/// `row` with every field cast to the matching field of `target`.
fn cast_row(row: &Expr, target: &Type) -> Expr {
    if row.ty() == *target {
        return row.clone();
    }
    let fields = match target.fields() {
        Some(fields) => fields,
        None => return row.clone(),
    };
    Expr::Tuple(
        row.flatten()
            .into_iter()
            .zip(fields)
            .map(|(e, ty)| e.cast(ty))
            .collect(),
    )
}

/// Prefixes an error with the plan node it was raised for.
fn node_error(err: CompilerError, id: OpIndex, kind: &str) -> CompilerError {
    let at = |s: String| format!("#{} {}: {}", id, kind, s);
    match err {
        CompilerError::Unimplemented(s) => CompilerError::Unimplemented(at(s)),
        CompilerError::TranslationError(s) => CompilerError::TranslationError(at(s)),
        CompilerError::ValidationError(s) => CompilerError::ValidationError(at(s)),
        CompilerError::ParseError(s) => CompilerError::ParseError(at(s)),
        CompilerError::ExecutionError(s) => CompilerError::ExecutionError(at(s)),
        CompilerError::IOError(s) => CompilerError::IOError(at(s)),
    }
}

/// Translates one relational plan into operators of a circuit.
///
/// Nodes are visited inputs first and every node is translated once, so sub-plans shared by
/// several consumers produce a single set of operators.
pub struct RelTranslator<'a, T: Catalog> {
    catalog: &'a T,
    options: &'a CompilerOptions,
    circuit: &'a mut Circuit,
    plan: &'a LogicalPlan,
    /// Operator producing the output of each translated plan node.
    memo: HashMap<OpIndex, OperatorId>,
}

impl<'a, T: 'a + Catalog> RelTranslator<'a, T> {
    /// # Arguments
    ///
    /// * `catalog` - Tables the plan may scan.
    /// * `options` - Compiler options.
    /// * `circuit` - Circuit receiving the operators.
    /// * `plan` - Plan to translate.
    pub fn new(
        catalog: &'a T,
        options: &'a CompilerOptions,
        circuit: &'a mut Circuit,
        plan: &'a LogicalPlan,
    ) -> Self {
        Self {
            catalog,
            options,
            circuit,
            plan,
            memo: HashMap::new(),
        }
    }

    /// Translates the whole plan and returns the operator producing the root's output.
    pub fn translate(mut self) -> Result<OperatorId, CompilerError> {
        let root = self
            .plan
            .root()
            .ok_or_else(|| CompilerError::TranslationError(String::from("Plan has no root")))?;
        for node in self.plan.post_order() {
            if self.memo.contains_key(&node) {
                continue;
            }
            let op = self.visit(node)?;
            self.memo.insert(node, op);
        }
        self.memo.get(&root).copied().ok_or_else(|| {
            CompilerError::TranslationError(format!("root #{} was not translated", root))
        })
    }

    fn visit(&mut self, id: OpIndex) -> Result<OperatorId, CompilerError> {
        let plan = self.plan;
        let node = plan.get_operator(id).ok_or_else(|| {
            CompilerError::TranslationError(format!("Plan has no node #{}", id))
        })?;
        trace!("Translating #{} {}", id, node.kind_name());
        let result = match node {
            LogicalOp::Scan(n) => self.visit_scan(n),
            LogicalOp::Project(n) => self.visit_project(id, n),
            LogicalOp::Filter(n) => self.visit_filter(id, n),
            LogicalOp::Aggregate(n) => self.visit_aggregate(id, n),
            LogicalOp::Join(n) => self.visit_join(id, n),
            LogicalOp::Union(n) => self.visit_union(id, n),
            LogicalOp::Minus(n) => self.visit_minus(id, n),
            LogicalOp::Intersect(n) => self.visit_intersect(id, n),
            LogicalOp::Window(n) => self.visit_window(id, n),
            LogicalOp::Sort(n) => self.visit_sort(id, n),
            LogicalOp::Values(n) => self.visit_values(n),
        };
        result.map_err(|e| node_error(e, id, node.kind_name()))
    }

    /// Operators producing the inputs of `id`, in order.
    fn inputs(&self, id: OpIndex) -> Result<Vec<OperatorId>, CompilerError> {
        let mut result = Vec::new();
        for input in self.plan.inputs(id) {
            let op = self.memo.get(&input).ok_or_else(|| {
                CompilerError::TranslationError(format!("input #{} was not translated", input))
            })?;
            result.push(*op);
        }
        Ok(result)
    }

    fn input(&self, id: OpIndex, index: usize) -> Result<OperatorId, CompilerError> {
        self.inputs(id)?.get(index).copied().ok_or_else(|| {
            CompilerError::TranslationError(format!("missing input {}", index))
        })
    }

    /// Returns `op`, passed through a Distinct when a set is required and `op` may hold duplicates.
    fn input_as(&mut self, op: OperatorId, as_multiset: bool) -> Result<OperatorId, CompilerError> {
        let (is_multiset, ty) = match self.circuit.operator(op) {
            Some(o) => (o.is_multiset, o.output_type.clone()),
            None => {
                return Err(CompilerError::TranslationError(format!(
                    "unknown operator {}",
                    op
                )))
            }
        };
        if as_multiset || !is_multiset {
            return Ok(op);
        }
        self.add(OperatorKind::Distinct, None, ty, vec![op])
    }

    fn add(
        &mut self,
        kind: OperatorKind,
        function: Option<Expr>,
        output_type: Type,
        inputs: Vec<OperatorId>,
    ) -> Result<OperatorId, CompilerError> {
        self.circuit
            .add_operator(Operator::new(kind, function, output_type, inputs))
    }

    fn declare(&mut self, prefix: &str, value: Expr) -> Expr {
        self.circuit.declare_local(prefix, value)
    }

    /// Row type of the Z-set stream produced by `op`.
    fn element_type(&self, op: OperatorId) -> Result<Type, CompilerError> {
        self.circuit
            .stream_type(op)
            .and_then(|t| t.element())
            .cloned()
            .ok_or_else(|| {
                CompilerError::TranslationError(format!("{} does not produce a Z-set", op))
            })
    }

    fn stream_type(&self, op: OperatorId) -> Result<Type, CompilerError> {
        self.circuit
            .stream_type(op)
            .cloned()
            .ok_or_else(|| CompilerError::TranslationError(format!("unknown operator {}", op)))
    }

    fn visit_scan(&mut self, node: &ScanNode) -> Result<OperatorId, CompilerError> {
        if let Some(existing) = self.circuit.get_operator(&node.table) {
            // A sink has no output of its own; read what feeds it.
            if existing.kind == OperatorKind::Sink {
                return existing.input().ok_or_else(|| {
                    CompilerError::TranslationError(format!("sink {} has no input", node.table))
                });
            }
            return Ok(existing.id);
        }
        if self.options.generate_inputs_from_tables {
            return Err(CompilerError::ValidationError(format!(
                "Table {} has no input",
                node.table
            )));
        }
        let table = self.catalog.get_table(&node.table)?;
        if table.schema.size() != node.schema.size() {
            return Err(CompilerError::ValidationError(format!(
                "Table {} has {} columns, the scan expects {}",
                node.table,
                table.schema.size(),
                node.schema.size()
            )));
        }
        add_source(self.circuit, table)
    }

    fn visit_project(&mut self, id: OpIndex, node: &ProjectNode) -> Result<OperatorId, CompilerError> {
        let input = self.input(id, 0)?;
        let t = Expr::var("t", self.element_type(input)?);
        let out = row_type(&node.schema);
        let out_fields = out.fields().unwrap_or(&[]);
        if out_fields.len() != node.exprs.len() {
            return Err(CompilerError::TranslationError(format!(
                "{} expressions for {} columns",
                node.exprs.len(),
                out_fields.len()
            )));
        }
        let ec = SqlExpressionCompiler::new();
        let mut fields = Vec::with_capacity(node.exprs.len());
        for (expr, ty) in node.exprs.iter().zip(out_fields) {
            fields.push(ec.compile(expr, Some(&t))?.cast(ty));
        }
        let closure = Expr::Tuple(fields).closure(vec![t.as_param()]);
        self.add(OperatorKind::Map, Some(closure), Type::zset(out), vec![input])
    }

    fn visit_filter(&mut self, id: OpIndex, node: &FilterNode) -> Result<OperatorId, CompilerError> {
        let input = self.input(id, 0)?;
        let t = Expr::var("t", self.element_type(input)?);
        let condition = SqlExpressionCompiler::new().compile(&node.condition, Some(&t))?;
        let closure = wrap_bool_if_needed(condition).closure(vec![t.as_param()]);
        let cond = self.declare("cond", closure);
        let ty = self.stream_type(input)?;
        self.add(OperatorKind::Filter, Some(cond), ty, vec![input])
    }

    fn visit_union(&mut self, id: OpIndex, node: &SetOpNode) -> Result<OperatorId, CompilerError> {
        let inputs = self.inputs(id)?;
        let ty = Type::zset(row_type(&node.schema));
        let sum = self.add(OperatorKind::Sum, None, ty.clone(), inputs)?;
        if node.all {
            Ok(sum)
        } else {
            self.add(OperatorKind::Distinct, None, ty, vec![sum])
        }
    }

    fn visit_minus(&mut self, id: OpIndex, node: &SetOpNode) -> Result<OperatorId, CompilerError> {
        let ty = Type::zset(row_type(&node.schema));
        let mut terms = Vec::new();
        for (i, input) in self.inputs(id)?.into_iter().enumerate() {
            let input = self.input_as(input, node.all)?;
            if i == 0 {
                terms.push(input);
            } else {
                let input_type = self.stream_type(input)?;
                terms.push(self.add(OperatorKind::Negate, None, input_type, vec![input])?);
            }
        }
        let sum = self.add(OperatorKind::Sum, None, ty.clone(), terms)?;
        if node.all {
            Ok(sum)
        } else {
            self.add(OperatorKind::Distinct, None, ty, vec![sum])
        }
    }

    fn visit_intersect(&mut self, id: OpIndex, node: &SetOpNode) -> Result<OperatorId, CompilerError> {
        if node.all {
            return Err(CompilerError::Unimplemented(String::from("INTERSECT ALL")));
        }
        let mut inputs = Vec::new();
        for input in self.inputs(id)? {
            inputs.push(self.input_as(input, false)?);
        }
        let mut previous = match inputs.first() {
            Some(first) => *first,
            None => {
                return Err(CompilerError::TranslationError(String::from(
                    "INTERSECT without inputs",
                )))
            }
        };
        let row = row_type(&node.schema);
        for input in inputs.into_iter().skip(1) {
            let left = self.index_whole_row(previous, &row)?;
            let right = self.index_whole_row(input, &row)?;
            let k = Expr::var("k", row.clone());
            let l = Expr::var("l", Type::unit());
            let r = Expr::var("r", Type::unit());
            let closure = k.clone().closure(vec![k.as_param(), l.as_param(), r.as_param()]);
            let join = self.declare("join", closure);
            previous = self.add(
                OperatorKind::Join,
                Some(join),
                Type::zset(row.clone()),
                vec![left, right],
            )?;
        }
        Ok(previous)
    }

    /// Indexes `input` by its entire row, cast to `row`, with an empty value.
    fn index_whole_row(&mut self, input: OperatorId, row: &Type) -> Result<OperatorId, CompilerError> {
        let t = Expr::var("t", self.element_type(input)?);
        let body = Expr::RawTuple(vec![cast_row(&t, row), Expr::RawTuple(vec![])]);
        let index = self.declare("index", body.closure(vec![t.as_param()]));
        self.add(
            OperatorKind::Index,
            Some(index),
            Type::indexed_zset(row.clone(), Type::unit()),
            vec![input],
        )
    }

    fn visit_values(&mut self, node: &ValuesNode) -> Result<OperatorId, CompilerError> {
        let row = row_type(&node.schema);
        let fields = row.fields().unwrap_or(&[]).to_vec();
        let mut rows = Vec::with_capacity(node.tuples.len());
        for tuple in node.tuples.iter() {
            if tuple.len() != fields.len() {
                return Err(CompilerError::TranslationError(format!(
                    "VALUES row with {} fields for {} columns",
                    tuple.len(),
                    fields.len()
                )));
            }
            let values = tuple
                .iter()
                .zip(fields.iter())
                .map(|(lit, ty)| {
                    if lit.value.is_null() {
                        Expr::null(ty)
                    } else {
                        SqlExpressionCompiler::literal(lit).cast(ty)
                    }
                })
                .collect();
            rows.push((Expr::Tuple(values), 1));
        }
        let literal = Expr::ZSetLiteral {
            rows,
            element_type: row.clone(),
        };
        self.add(OperatorKind::Constant, Some(literal), Type::zset(row), vec![])
    }

    fn visit_aggregate(
        &mut self,
        id: OpIndex,
        node: &AggregateNode,
    ) -> Result<OperatorId, CompilerError> {
        let input = self.input(id, 0)?;
        let input = self.input_as(input, true)?;
        let out = row_type(&node.schema);
        let out_fields = out.fields().unwrap_or(&[]).to_vec();
        let group_count = node.group_keys.len();
        if out_fields.len() != group_count + node.aggregates.len() {
            return Err(CompilerError::TranslationError(format!(
                "{} group keys and {} aggregates for {} columns",
                group_count,
                node.aggregates.len(),
                out_fields.len()
            )));
        }
        let mut row = self.element_type(input)?;
        if node.aggregates.is_empty() {
            return self.distinct_groups(input, &row, &node.group_keys, out);
        }
        let declared = &out_fields[group_count..];

        let mut source = input;
        let mut group_keys = node.group_keys.clone();
        let mut calls = node.aggregates.clone();
        if calls.iter().any(|c| c.distinct) {
            let argument = distinct_argument(&calls)?;
            let t = Expr::var("t", row.clone());
            let mut fields: Vec<Expr> = group_keys.iter().map(|k| t.field(*k)).collect();
            fields.push(t.field(argument));
            let projection = Expr::Tuple(fields);
            let projected = projection.ty();
            let map = self.declare("map", projection.closure(vec![t.as_param()]));
            let map = self.add(
                OperatorKind::Map,
                Some(map),
                Type::zset(projected.clone()),
                vec![source],
            )?;
            source = self.add(
                OperatorKind::Distinct,
                None,
                Type::zset(projected.clone()),
                vec![map],
            )?;
            group_keys = (0..group_count).collect();
            for call in calls.iter_mut() {
                call.args = vec![group_count];
            }
            row = projected;
        }

        let t = Expr::var("t", row.clone());
        let key = Expr::RawTuple(group_keys.iter().map(|k| t.field(*k)).collect());
        let key_type = key.ty();
        let index = self.declare(
            "index",
            Expr::RawTuple(vec![key, t.clone()]).closure(vec![t.as_param()]),
        );
        let indexed_type = Type::indexed_zset(key_type.clone(), row.clone());
        let index = self.add(
            OperatorKind::Index,
            Some(index),
            indexed_type.clone(),
            vec![source],
        )?;

        let fd = create_folding_function(self.circuit, &calls, declared, &row)?;
        let aggregate_type = Type::indexed_zset(key_type.clone(), fd.result_type.clone());
        let aggregate = if self.options.incremental_aggregates {
            let diff = self.add(OperatorKind::Differential, None, indexed_type, vec![index])?;
            let agg = self.add(
                OperatorKind::IncrementalAggregate,
                Some(fd.fold.clone()),
                aggregate_type.clone(),
                vec![diff],
            )?;
            self.add(OperatorKind::Integral, None, aggregate_type, vec![agg])?
        } else {
            self.add(
                OperatorKind::Aggregate,
                Some(fd.fold.clone()),
                aggregate_type,
                vec![index],
            )?
        };

        let k = Expr::var("k", key_type);
        let v = Expr::var("v", fd.result_type.clone());
        let mut flat = Vec::with_capacity(out_fields.len());
        for (i, ty) in out_fields.iter().enumerate() {
            if i < group_count {
                flat.push(k.field(i).cast(ty));
            } else {
                flat.push(v.field(i - group_count).cast(ty));
            }
        }
        let flatten = self.declare(
            "flatten",
            Expr::Tuple(flat).closure(vec![k.as_param(), v.as_param()]),
        );
        let result = self.add(
            OperatorKind::Map,
            Some(flatten),
            Type::zset(out.clone()),
            vec![aggregate],
        )?;
        if group_count > 0 {
            return Ok(result);
        }

        // Without GROUP BY an empty input still yields one row of defaults:
        // default - map(result -> default) + result.
        let default = Expr::Tuple(
            fd.default_zero
                .flatten()
                .into_iter()
                .zip(declared.iter())
                .map(|(e, ty)| e.cast(ty))
                .collect(),
        );
        let ignored = Expr::var("_t", out.clone());
        let to_default = default.clone().closure(vec![ignored.as_param()]);
        let stream = Type::zset(out.clone());
        let mapped = self.add(OperatorKind::Map, Some(to_default), stream.clone(), vec![result])?;
        let negated = self.add(OperatorKind::Negate, None, stream.clone(), vec![mapped])?;
        let constant = Expr::ZSetLiteral {
            rows: vec![(default, 1)],
            element_type: out,
        };
        let constant = self.add(OperatorKind::Constant, Some(constant), stream.clone(), vec![])?;
        self.add(
            OperatorKind::Sum,
            None,
            stream,
            vec![constant, negated, result],
        )
    }

    /// An aggregation without aggregate calls: the distinct group keys.
    fn distinct_groups(
        &mut self,
        input: OperatorId,
        row: &Type,
        group_keys: &[usize],
        out: Type,
    ) -> Result<OperatorId, CompilerError> {
        let width = row.fields().map_or(0, |f| f.len());
        let identity = group_keys.len() == width && group_keys.iter().enumerate().all(|(i, k)| i == *k);
        let source = if identity {
            input
        } else {
            let t = Expr::var("t", row.clone());
            let keys = Expr::Tuple(group_keys.iter().map(|k| t.field(*k)).collect());
            let keys = cast_row(&keys, &out);
            let map = self.declare("map", keys.closure(vec![t.as_param()]));
            self.add(OperatorKind::Map, Some(map), Type::zset(out.clone()), vec![input])?
        };
        self.add(OperatorKind::Distinct, None, Type::zset(out), vec![source])
    }

    fn visit_join(&mut self, id: OpIndex, node: &JoinNode) -> Result<OperatorId, CompilerError> {
        match node.join_type {
            JoinType::Semi | JoinType::Anti => {
                return Err(CompilerError::Unimplemented(format!(
                    "{:?} join",
                    node.join_type
                )))
            }
            _ => (),
        }
        let inputs = self.inputs(id)?;
        if inputs.len() != 2 {
            return Err(CompilerError::TranslationError(format!(
                "join with {} inputs",
                inputs.len()
            )));
        }
        let left = self.input_as(inputs[0], true)?;
        let right = self.input_as(inputs[1], true)?;
        let left_type = self.element_type(left)?;
        let right_type = self.element_type(right)?;
        let left_width = left_type.fields().map_or(0, |f| f.len());

        let result_type = row_type(&node.schema);
        let result_fields = result_type.fields().unwrap_or(&[]).to_vec();
        let right_width = right_type.fields().map_or(0, |f| f.len());
        if result_fields.len() != left_width + right_width {
            return Err(CompilerError::TranslationError(format!(
                "join of {} and {} columns produces {}",
                left_width,
                right_width,
                result_fields.len()
            )));
        }
        let left_result = Type::Tuple(result_fields[..left_width].to_vec());
        let right_result = Type::Tuple(result_fields[left_width..].to_vec());

        let decomposition = JoinConditionAnalyzer::new(left_width).analyze(&node.condition)?;
        let filtered_left = self.filter_non_null_keys(left, &decomposition.left_columns())?;
        let filtered_right = self.filter_non_null_keys(right, &decomposition.right_columns())?;

        let l = Expr::var("l", left_type.clone());
        let r = Expr::var("r", right_type.clone());
        let mut left_key = Vec::new();
        let mut right_key = Vec::new();
        for test in decomposition.comparisons.iter() {
            let key_type = Type::from_sql(test.common_type.with_nullable(false));
            left_key.push(l.field(test.left_column).cast(&key_type));
            right_key.push(r.field(test.right_column).cast(&key_type));
        }
        let left_key = Expr::RawTuple(left_key);
        let right_key = Expr::RawTuple(right_key);
        let key_type = left_key.ty();

        let left_index = self.declare(
            "index",
            Expr::RawTuple(vec![left_key, l.clone()]).closure(vec![l.as_param()]),
        );
        let left_index = self.add(
            OperatorKind::Index,
            Some(left_index),
            Type::indexed_zset(key_type.clone(), left_type.clone()),
            vec![filtered_left],
        )?;
        let right_index = self.declare(
            "index",
            Expr::RawTuple(vec![right_key, r.clone()]).closure(vec![r.as_param()]),
        );
        let right_index = self.add(
            OperatorKind::Index,
            Some(right_index),
            Type::indexed_zset(key_type.clone(), right_type.clone()),
            vec![filtered_right],
        )?;

        let k = Expr::var("k", key_type);
        let pair_fields: Vec<Expr> = l
            .flatten()
            .into_iter()
            .chain(r.flatten())
            .zip(result_fields.iter())
            .map(|(e, ty)| e.cast(ty))
            .collect();
        let pair = self.declare(
            "pair",
            Expr::Tuple(pair_fields).closure(vec![k.as_param(), l.as_param(), r.as_param()]),
        );
        let stream = Type::zset(result_type.clone());
        let mut inner = self.add(
            OperatorKind::Join,
            Some(pair),
            stream.clone(),
            vec![left_index, right_index],
        )?;

        if let Some(residual) = &decomposition.residual {
            let t = Expr::var("t", result_type.clone());
            let condition = SqlExpressionCompiler::new().compile(residual, Some(&t))?;
            let condition = wrap_bool_if_needed(condition);
            if condition.as_bool_literal() != Some(Some(true)) {
                let cond = self.declare("cond", condition.closure(vec![t.as_param()]));
                inner = self.add(OperatorKind::Filter, Some(cond), stream.clone(), vec![inner])?;
            }
        }

        let mut result = inner;
        if node.join_type == JoinType::Left || node.join_type == JoinType::Full {
            let unmatched = self.unmatched_rows(inner, left, &result_type, 0, &left_result)?;
            let lc = Expr::var("l", left_result.clone());
            let padded: Vec<Expr> = lc
                .flatten()
                .into_iter()
                .chain(right_result.fields().unwrap_or(&[]).iter().map(Expr::null))
                .collect();
            let expand = self.declare("expand", Expr::Tuple(padded).closure(vec![lc.as_param()]));
            let expanded = self.add(OperatorKind::Map, Some(expand), stream.clone(), vec![unmatched])?;
            result = self.add(OperatorKind::Sum, None, stream.clone(), vec![result, expanded])?;
        }
        if node.join_type == JoinType::Right || node.join_type == JoinType::Full {
            let unmatched =
                self.unmatched_rows(inner, right, &result_type, left_width, &right_result)?;
            let rc = Expr::var("r", right_result.clone());
            let padded: Vec<Expr> = left_result
                .fields()
                .unwrap_or(&[])
                .iter()
                .map(Expr::null)
                .chain(rc.flatten())
                .collect();
            let expand = self.declare("expand", Expr::Tuple(padded).closure(vec![rc.as_param()]));
            let expanded = self.add(OperatorKind::Map, Some(expand), stream.clone(), vec![unmatched])?;
            result = self.add(OperatorKind::Sum, None, stream, vec![result, expanded])?;
        }
        Ok(result)
    }

    /// Rows of `side` with no match in `inner`, cast to `side_result`.
    ///
    /// # Arguments
    ///
    /// * `inner` - Inner join output.
    /// * `side` - Preserved join input.
    /// * `result_type` - Row type of the join output.
    /// * `offset` - Position of the preserved side's columns in the join output.
    /// * `side_result` - Types of the preserved side's columns in the join output.
    fn unmatched_rows(
        &mut self,
        inner: OperatorId,
        side: OperatorId,
        result_type: &Type,
        offset: usize,
        side_result: &Type,
    ) -> Result<OperatorId, CompilerError> {
        let side_stream = Type::zset(side_result.clone());
        let width = side_result.fields().map_or(0, |f| f.len());
        let j = Expr::var("j", result_type.clone());
        let projection = Expr::Tuple((offset..offset + width).map(|i| j.field(i)).collect());
        let proj = self.declare("proj", projection.closure(vec![j.as_param()]));
        let matched = self.add(OperatorKind::Map, Some(proj), side_stream.clone(), vec![inner])?;
        let matched = self.add(OperatorKind::Distinct, None, side_stream.clone(), vec![matched])?;

        let side_type = self.element_type(side)?;
        let cast = if side_type == *side_result {
            side
        } else {
            let s = Expr::var("s", side_type);
            let closure = cast_row(&s, side_result).closure(vec![s.as_param()]);
            self.add(OperatorKind::Map, Some(closure), side_stream.clone(), vec![side])?
        };
        // A matched row must cancel out however often it occurs on its side.
        let cast = self.add(OperatorKind::Distinct, None, side_stream.clone(), vec![cast])?;
        let difference = self.add(
            OperatorKind::Subtract,
            None,
            side_stream.clone(),
            vec![cast, matched],
        )?;
        self.add(OperatorKind::Distinct, None, side_stream, vec![difference])
    }

    /// Drops the rows of `input` with a NULL in any of `columns`.
    fn filter_non_null_keys(
        &mut self,
        input: OperatorId,
        columns: &[usize],
    ) -> Result<OperatorId, CompilerError> {
        let row = self.element_type(input)?;
        let nullable: Vec<usize> = columns
            .iter()
            .copied()
            .filter(|c| row.field(*c).map_or(false, Type::is_nullable))
            .collect();
        if nullable.is_empty() {
            return Ok(input);
        }
        let r = Expr::var("r", row.clone());
        let mut condition: Option<Expr> = None;
        for c in nullable {
            let test = Expr::apply("is_null", vec![r.field(c)], Type::bool(false));
            condition = Some(match condition {
                Some(previous) => Expr::binary(BinaryOp::Or, previous, test, Type::bool(false)),
                None => test,
            });
        }
        let condition = match condition {
            Some(c) => c,
            None => return Ok(input),
        };
        let body = Expr::if_then_else(
            condition,
            Expr::VecLiteral {
                elements: vec![],
                element_type: row.clone(),
            },
            Expr::VecLiteral {
                elements: vec![r.clone()],
                element_type: row.clone(),
            },
        );
        let filter = self.declare("filter", body.closure(vec![r.as_param()]));
        self.add(OperatorKind::FlatMap, Some(filter), Type::zset(row), vec![input])
    }
}

/// The argument column shared by every DISTINCT call of an aggregation.
fn distinct_argument(calls: &[AggregateCall]) -> Result<usize, CompilerError> {
    let mut argument = None;
    for call in calls {
        let arg = match (call.distinct, call.args.as_slice()) {
            (true, [arg]) => *arg,
            _ => {
                return Err(CompilerError::Unimplemented(format!(
                    "{} together with DISTINCT aggregates",
                    call
                )))
            }
        };
        match argument {
            Some(a) if a != arg => {
                return Err(CompilerError::Unimplemented(String::from(
                    "DISTINCT aggregates over different columns",
                )))
            }
            _ => argument = Some(arg),
        }
    }
    argument.ok_or_else(|| CompilerError::TranslationError(String::from("no DISTINCT aggregate")))
}

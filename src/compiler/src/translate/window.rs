use super::{row_type, RelTranslator};
use crate::aggregate::create_folding_function;
use crate::expression::{ExpressionCompiler, SqlExpressionCompiler};
use circuit::{Expr, OperatorId, OperatorKind, ScalarKind, Type};
use common::catalog::Catalog;
use common::logical_plan::{Direction, OpIndex, WindowBound, WindowGroup, WindowNode};
use common::{CompilerError, Field};

/// Largest value of an order column type; the distance covered by an unbounded frame end.
///
/// An unbounded frame therefore only reaches rows whose order values lie within this distance of
/// the current row: for INT columns, rows more than `i32::MAX` apart fall outside it.
fn max_value(ty: &Type) -> Result<Expr, CompilerError> {
    let value = match ty.kind() {
        Some(ScalarKind::Int16) => Field::IntField(i64::from(i16::MAX)),
        Some(ScalarKind::Int32) => Field::IntField(i64::from(i32::MAX)),
        Some(ScalarKind::Int64) => Field::IntField(i64::MAX),
        Some(ScalarKind::Timestamp) => Field::TimestampField(i64::MAX),
        _ => {
            return Err(CompilerError::Unimplemented(format!(
                "window ordered by {}",
                ty
            )))
        }
    };
    Ok(Expr::literal(value, ty.clone()))
}

fn zero_value(ty: &Type) -> Expr {
    match ty.kind() {
        Some(ScalarKind::Timestamp) => Expr::literal(Field::TimestampField(0), ty.clone()),
        _ => Expr::int(0, ty.clone()),
    }
}

impl<'a, T: 'a + Catalog> RelTranslator<'a, T> {
    /// Frame end as an offset before or after the current order value.
    fn window_bound(
        &self,
        bound: &WindowBound,
        order_type: &Type,
        ec: &SqlExpressionCompiler,
        row: &Expr,
    ) -> Result<Expr, CompilerError> {
        let value = match bound {
            WindowBound::UnboundedPreceding | WindowBound::UnboundedFollowing => {
                max_value(order_type)?
            }
            WindowBound::CurrentRow => zero_value(order_type),
            WindowBound::Preceding(offset) | WindowBound::Following(offset) => {
                ec.compile(offset, Some(row))?.cast(order_type)
            }
        };
        Ok(Expr::RelOffset {
            before: bound.is_preceding(),
            value: Box::new(value),
        })
    }

    pub(super) fn visit_window(
        &mut self,
        id: OpIndex,
        node: &WindowNode,
    ) -> Result<OperatorId, CompilerError> {
        let input = self.input(id, 0)?;
        let input = self.input_as(input, true)?;
        let input_type = self.element_type(input)?;
        let out_fields = row_type(&node.schema).fields().unwrap_or(&[]).to_vec();
        let ec = SqlExpressionCompiler::with_constants(node.constants.clone());

        let mut last = input;
        let mut current_type = input_type.clone();
        let mut next_column = input_type.fields().map_or(0, |f| f.len());
        for group in node.groups.iter() {
            let declared = out_fields
                .get(next_column..next_column + group.aggregate_calls.len())
                .ok_or_else(|| {
                    CompilerError::TranslationError(format!(
                        "window adds {} columns past the {} declared",
                        group.aggregate_calls.len(),
                        out_fields.len()
                    ))
                })?
                .to_vec();
            let (joined, joined_type) =
                self.window_group(group, input, &input_type, last, &current_type, &declared, &ec)?;
            last = joined;
            current_type = joined_type;
            next_column += group.aggregate_calls.len();
        }
        if next_column != out_fields.len() {
            return Err(CompilerError::TranslationError(format!(
                "window produces {} columns, {} declared",
                next_column,
                out_fields.len()
            )));
        }
        Ok(last)
    }

    /// Lowers one OVER clause and joins its results onto `previous`.
    ///
    /// Returns the joined operator and its row type.
    #[allow(clippy::too_many_arguments)]
    fn window_group(
        &mut self,
        group: &WindowGroup,
        input: OperatorId,
        input_type: &Type,
        previous: OperatorId,
        previous_type: &Type,
        declared: &[Type],
        ec: &SqlExpressionCompiler,
    ) -> Result<(OperatorId, Type), CompilerError> {
        let order = match group.order_keys.as_slice() {
            [order] => *order,
            [] => {
                return Err(CompilerError::Unimplemented(String::from(
                    "window without ORDER BY",
                )))
            }
            _ => {
                return Err(CompilerError::Unimplemented(String::from(
                    "window ORDER BY with multiple columns",
                )))
            }
        };
        if order.direction != Direction::Ascending {
            return Err(CompilerError::Unimplemented(format!(
                "window ORDER BY {:?}",
                order.direction
            )));
        }
        let order_type = input_type
            .field(order.field)
            .cloned()
            .ok_or_else(|| {
                CompilerError::TranslationError(format!("order column {} out of range", order.field))
            })?;
        let orderable = order_type.is_integer() || order_type.kind() == Some(ScalarKind::Timestamp);
        if !orderable {
            return Err(CompilerError::Unimplemented(format!(
                "window ordered by {}",
                order_type
            )));
        }
        if order_type.is_nullable() {
            return Err(CompilerError::Unimplemented(String::from(
                "window ordered by a nullable column",
            )));
        }

        let t = Expr::var("t", input_type.clone());
        let lower = self.window_bound(&group.lower, &order_type, ec, &t)?;
        let upper = self.window_bound(&group.upper, &order_type, ec, &t)?;
        let window = self.declare(
            "window",
            Expr::RelRange {
                lower: Box::new(lower),
                upper: Box::new(upper),
            },
        );

        let partition = Expr::Tuple(group.keys.iter().map(|k| t.field(*k)).collect());
        let partition_type = partition.ty();
        let order_and_row = Expr::RawTuple(vec![t.field(order.field), t.clone()]);
        let value_type = order_and_row.ty();
        let map = self.declare(
            "map",
            Expr::RawTuple(vec![partition, order_and_row]).closure(vec![t.as_param()]),
        );
        let indexed_type = Type::indexed_zset(partition_type.clone(), value_type);
        let indexed = self.add(OperatorKind::Index, Some(map), indexed_type.clone(), vec![input])?;

        let calls = group.aggregate_calls.clone();
        let fold_types: Vec<Type> = calls.iter().map(|c| Type::from_sql(c.ty)).collect();
        let fd = create_folding_function(self.circuit, &calls, &fold_types, input_type)?;

        let key_type = Type::RawTuple(vec![partition_type, order_type]);
        let windowed_type = Type::indexed_zset(key_type.clone(), fd.result_type.clone());
        let diff = self.add(OperatorKind::Differential, None, indexed_type, vec![indexed])?;
        let op = circuit::Operator::new(
            OperatorKind::WindowAggregate,
            Some(fd.fold.clone()),
            windowed_type.clone(),
            vec![diff],
        )
        .with_window(window);
        let windowed = self.circuit.add_operator(op)?;
        let integral = self.add(OperatorKind::Integral, None, windowed_type, vec![windowed])?;

        // The previous row starts with the input row, so the key columns keep their positions.
        let p = Expr::var("t", previous_type.clone());
        let key = Expr::RawTuple(vec![
            Expr::Tuple(group.keys.iter().map(|k| p.field(*k)).collect()),
            p.field(order.field),
        ]);
        let index = self.declare(
            "index",
            Expr::RawTuple(vec![key, p.clone()]).closure(vec![p.as_param()]),
        );
        let reindexed = self.add(
            OperatorKind::Index,
            Some(index),
            Type::indexed_zset(key_type.clone(), previous_type.clone()),
            vec![previous],
        )?;

        let k = Expr::var("k", key_type);
        let l = Expr::var("l", previous_type.clone());
        let r = Expr::var("r", fd.result_type.clone());
        let fields: Vec<Expr> = l
            .flatten()
            .into_iter()
            .chain(
                declared
                    .iter()
                    .enumerate()
                    .map(|(i, ty)| r.field(i).cast(ty)),
            )
            .collect();
        let joined = Expr::Tuple(fields);
        let joined_type = joined.ty();
        let join = self.declare(
            "join",
            joined.closure(vec![k.as_param(), l.as_param(), r.as_param()]),
        );
        let joined = self.add(
            OperatorKind::Join,
            Some(join),
            Type::zset(joined_type.clone()),
            vec![reindexed, integral],
        )?;
        Ok((joined, joined_type))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::options::CompilerOptions;
    use circuit::Circuit;
    use common::logical_plan::*;
    use common::table::Table;
    use common::testutil::*;
    use common::{DataType, SqlType};
    use std::collections::HashMap;

    struct OneTable(HashMap<String, Table>);

    impl Catalog for OneTable {
        fn get_tables(&self) -> &HashMap<String, Table> {
            &self.0
        }
    }

    fn window_plan(order: FieldCollation, lower: WindowBound) -> (OneTable, LogicalPlan) {
        let input = schema(&[("p", int()), ("o", int()), ("x", nullable_int())]);
        let mut tables = HashMap::new();
        tables.insert(String::from("w"), Table::new(String::from("w"), input.clone()));
        let out = input.merge(&schema(&[("s", nullable_int())]));
        let mut plan = LogicalPlan::new();
        let window = plan.add_node(LogicalOp::Window(WindowNode {
            groups: vec![WindowGroup {
                keys: vec![0],
                order_keys: vec![order],
                lower,
                upper: WindowBound::CurrentRow,
                aggregate_calls: vec![AggregateCall::new(AggFunction::Sum, vec![2], nullable_int())],
            }],
            constants: vec![RexLiteral::new(
                Field::IntField(2),
                SqlType::not_null(DataType::Int),
            )],
            schema: out,
        }));
        let scan = plan.add_node(LogicalOp::Scan(ScanNode {
            table: String::from("w"),
            schema: input,
        }));
        plan.add_edge(window, scan);
        (OneTable(tables), plan)
    }

    fn translate(catalog: &OneTable, plan: &LogicalPlan) -> Result<Circuit, CompilerError> {
        let options = CompilerOptions::default();
        let mut circuit = Circuit::new("window");
        RelTranslator::new(catalog, &options, &mut circuit, plan).translate()?;
        Ok(circuit)
    }

    #[test]
    fn test_window_shape() {
        let (catalog, plan) = window_plan(
            FieldCollation::new(1, Direction::Ascending),
            WindowBound::Preceding(RexNode::input_ref(3, int())),
        );
        let circuit = translate(&catalog, &plan).unwrap();
        let kinds: Vec<OperatorKind> = circuit.operators().iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![
                OperatorKind::Source,
                OperatorKind::Index,
                OperatorKind::Differential,
                OperatorKind::WindowAggregate,
                OperatorKind::Integral,
                OperatorKind::Index,
                OperatorKind::Join
            ]
        );
        let window = circuit.operators()[3].window.as_ref().unwrap();
        match circuit.resolve(window) {
            Expr::RelRange { lower, .. } => match lower.as_ref() {
                Expr::RelOffset { before, value } => {
                    assert!(*before);
                    assert_eq!(**value, Expr::int(2, Type::from_sql(int())));
                }
                other => panic!("unexpected {}", other),
            },
            other => panic!("unexpected {}", other),
        }
        let join = &circuit.operators()[6];
        assert_eq!(join.output_type.element().unwrap().fields().unwrap().len(), 4);
    }

    #[test]
    fn test_window_descending_unimplemented() {
        let (catalog, plan) = window_plan(
            FieldCollation::new(1, Direction::Descending),
            WindowBound::UnboundedPreceding,
        );
        match translate(&catalog, &plan) {
            Err(CompilerError::Unimplemented(msg)) => assert!(msg.contains("Window")),
            other => panic!("unexpected {:?}", other.map(|c| c.to_string())),
        }
    }

    #[test]
    fn test_window_nullable_order_unimplemented() {
        let (catalog, plan) = window_plan(
            FieldCollation::new(2, Direction::Ascending),
            WindowBound::UnboundedPreceding,
        );
        assert!(translate(&catalog, &plan).is_err());
    }
}

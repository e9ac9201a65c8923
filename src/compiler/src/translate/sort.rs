use super::RelTranslator;
use circuit::{Expr, OperatorId, OperatorKind, Type};
use common::catalog::Catalog;
use common::logical_plan::{Direction, OpIndex, SortNode};
use common::CompilerError;

impl<'a, T: 'a + Catalog> RelTranslator<'a, T> {
    /// ORDER BY: every row goes into one vector under the empty key, which is then sorted.
    pub(super) fn visit_sort(&mut self, id: OpIndex, node: &SortNode) -> Result<OperatorId, CompilerError> {
        if node.fetch.is_some() {
            return Err(CompilerError::Unimplemented(String::from("ORDER BY with LIMIT")));
        }
        let input = self.input(id, 0)?;
        let row = self.element_type(input)?;
        let t = Expr::var("t", row.clone());
        let index = self.declare(
            "index",
            Expr::RawTuple(vec![Expr::RawTuple(vec![]), t.clone()]).closure(vec![t.as_param()]),
        );
        let indexed = self.add(
            OperatorKind::Index,
            Some(index),
            Type::indexed_zset(Type::unit(), row.clone()),
            vec![input],
        )?;

        let vec_type = Type::Vec(Box::new(row.clone()));
        let a = Expr::var("a", vec_type.clone());
        let v = Expr::var("v", row.clone());
        let w = Expr::var("w", Type::Weight);
        let push = Expr::apply(
            "weighted_push",
            vec![a.clone(), v.clone(), w.clone()],
            vec_type.clone(),
        );
        let fold = Expr::Fold {
            zero: Box::new(Expr::VecLiteral {
                elements: vec![],
                element_type: row.clone(),
            }),
            increment: Box::new(push.closure(vec![a.as_param(), v.as_param(), w.as_param()])),
            postprocess: None,
        };
        let to_vec = self.declare("toVec", fold);
        let collected = self.add(
            OperatorKind::Aggregate,
            Some(to_vec),
            Type::indexed_zset(Type::unit(), vec_type.clone()),
            vec![indexed],
        )?;

        let mut comparator: Option<Expr> = None;
        for collation in node.collation.iter() {
            let key = v.field(collation.field).closure(vec![v.as_param()]);
            let mut next = Expr::Extract(Box::new(key));
            match collation.direction {
                Direction::Ascending => (),
                Direction::Descending => next = Expr::Rev(Box::new(next)),
                other => {
                    return Err(CompilerError::Unimplemented(format!(
                        "ORDER BY direction {:?}",
                        other
                    )))
                }
            }
            comparator = Some(match comparator {
                Some(previous) => Expr::Then(Box::new(previous), Box::new(next)),
                None => next,
            });
        }
        let comparator = comparator.ok_or_else(|| {
            CompilerError::TranslationError(String::from("ORDER BY without collation"))
        })?;
        let comp = self.declare("comp", comparator);

        let k = Expr::var("k", Type::unit());
        let sorted = Expr::var("v", vec_type.clone());
        let body = Expr::SortBy {
            vec: Box::new(sorted.clone()),
            comparator: Box::new(comp),
        };
        let sort = self.declare("sort", body.closure(vec![k.as_param(), sorted.as_param()]));
        self.add(OperatorKind::Map, Some(sort), Type::zset(vec_type), vec![collected])
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

    struct Tables(HashMap<String, Table>);

    impl Catalog for Tables {
        fn get_tables(&self) -> &HashMap<String, Table> {
            &self.0
        }
    }

    fn sort_plan(collation: Vec<FieldCollation>, fetch: Option<RexNode>) -> (Tables, LogicalPlan) {
        let s = schema(&[("name", SqlType::not_null(DataType::Varchar)), ("n", int())]);
        let mut tables = HashMap::new();
        tables.insert(String::from("r"), Table::new(String::from("r"), s.clone()));
        let mut plan = LogicalPlan::new();
        let sort = plan.add_node(LogicalOp::Sort(SortNode {
            collation,
            fetch,
            schema: s.clone(),
        }));
        let scan = plan.add_node(LogicalOp::Scan(ScanNode {
            table: String::from("r"),
            schema: s,
        }));
        plan.add_edge(sort, scan);
        (Tables(tables), plan)
    }

    fn translate(tables: &Tables, plan: &LogicalPlan) -> Result<Circuit, CompilerError> {
        let options = CompilerOptions::default();
        let mut circuit = Circuit::new("sort");
        RelTranslator::new(tables, &options, &mut circuit, plan).translate()?;
        Ok(circuit)
    }

    #[test]
    fn test_sort_shape_and_comparator() {
        let (tables, plan) = sort_plan(
            vec![
                FieldCollation::new(0, Direction::Ascending),
                FieldCollation::new(1, Direction::Descending),
            ],
            None,
        );
        let circuit = translate(&tables, &plan).unwrap();
        let kinds: Vec<OperatorKind> = circuit.operators().iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![
                OperatorKind::Source,
                OperatorKind::Index,
                OperatorKind::Aggregate,
                OperatorKind::Map
            ]
        );
        let comp = circuit
            .declarations()
            .iter()
            .find(|d| d.name.starts_with("comp_"))
            .unwrap();
        match &comp.value {
            Expr::Then(first, second) => {
                assert!(matches!(first.as_ref(), Expr::Extract(_)));
                assert!(matches!(second.as_ref(), Expr::Rev(_)));
            }
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn test_sort_errors() {
        let (tables, plan) = sort_plan(vec![], None);
        match translate(&tables, &plan) {
            Err(CompilerError::TranslationError(_)) => (),
            other => panic!("unexpected {:?}", other.map(|c| c.to_string())),
        }
        let (tables, plan) = sort_plan(vec![FieldCollation::new(0, Direction::Clustered)], None);
        match translate(&tables, &plan) {
            Err(CompilerError::Unimplemented(_)) => (),
            other => panic!("unexpected {:?}", other.map(|c| c.to_string())),
        }
        let limit = RexNode::literal(common::Field::IntField(1), int());
        let (tables, plan) = sort_plan(vec![FieldCollation::new(0, Direction::Ascending)], Some(limit));
        match translate(&tables, &plan) {
            Err(CompilerError::Unimplemented(msg)) => assert!(msg.contains("LIMIT")),
            other => panic!("unexpected {:?}", other.map(|c| c.to_string())),
        }
    }
}

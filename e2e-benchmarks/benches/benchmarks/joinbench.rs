use criterion::{criterion_group, Criterion};

use crate::benchmarks::benchtemplate::Template;
use circuitexe::zset_from_rows;
use common::logical_plan::*;
use common::testutil::*;
use common::{DataType, SqlOperator, SqlType};
use rand::rngs::StdRng;
use rand::SeedableRng;

const DDL: &str = "CREATE TABLE testA (a INT NOT NULL, b INT NOT NULL); \
                   CREATE TABLE testB (a INT NOT NULL, b INT NOT NULL);";

fn scan(plan: &mut LogicalPlan, table: &str) -> OpIndex {
    plan.add_node(LogicalOp::Scan(ScanNode {
        table: table.to_string(),
        schema: schema(&[("a", int()), ("b", int())]),
    }))
}

/// `select * from testA join testB on testA.a = testB.a`
fn join_plan() -> LogicalPlan {
    let mut plan = LogicalPlan::new();
    let join = plan.add_node(LogicalOp::Join(JoinNode {
        join_type: JoinType::Inner,
        condition: RexNode::compare(
            SqlOperator::Equals,
            RexNode::input_ref(0, int()),
            RexNode::input_ref(2, int()),
        ),
        schema: schema(&[("a", int()), ("b", int()), ("a0", int()), ("b0", int())]),
    }));
    let left = scan(&mut plan, "testA");
    let right = scan(&mut plan, "testB");
    plan.add_edge(join, left);
    plan.add_edge(join, right);
    plan
}

/// `select a, count(*), sum(b) from testA group by a`
fn aggregate_plan() -> LogicalPlan {
    let mut plan = LogicalPlan::new();
    let count = SqlType::not_null(DataType::BigInt);
    let aggregate = plan.add_node(LogicalOp::Aggregate(AggregateNode {
        group_keys: vec![0],
        aggregates: vec![
            AggregateCall::new(AggFunction::Count, vec![], count),
            AggregateCall::new(AggFunction::Sum, vec![1], int()),
        ],
        schema: schema(&[("a", int()), ("c", count), ("s", int())]),
    }));
    let source = scan(&mut plan, "testA");
    plan.add_edge(aggregate, source);
    plan
}

fn load(template: &mut Template, rows: usize) {
    let mut rng = StdRng::seed_from_u64(rows as u64);
    for table in ["testA", "testB"].iter() {
        let data = gen_random_int_rows(&mut rng, rows, 2, (rows as i64 / 4).max(1));
        template.data.insert(table.to_string(), zset_from_rows(data));
    }
}

fn bench_join_translation(c: &mut Criterion) {
    let mut bt = Template::new(DDL);
    bt.add_view("joined", join_plan());
    bt.show_configuration();
    bt.bench_translation(c, "join_translation");
}

fn bench_join_tiny(c: &mut Criterion) {
    let mut bt = Template::new(DDL);
    bt.add_view("joined", join_plan());
    load(&mut bt, 10);
    bt.show_configuration();
    bt.bench_evaluation(c, "join_tiny");
}

fn bench_join_small(c: &mut Criterion) {
    let mut bt = Template::new(DDL);
    bt.add_view("joined", join_plan());
    load(&mut bt, 200);
    bt.show_configuration();
    bt.bench_evaluation(c, "join_small");
}

fn bench_aggregate_small(c: &mut Criterion) {
    let mut bt = Template::new(DDL);
    bt.add_view("grouped", aggregate_plan());
    load(&mut bt, 200);
    bt.show_configuration();
    bt.bench_evaluation(c, "aggregate_small");
}

fn bench_aggregate_small_incremental(c: &mut Criterion) {
    let mut bt = Template::new(DDL);
    bt.options.incremental_aggregates = true;
    bt.add_view("grouped", aggregate_plan());
    load(&mut bt, 200);
    bt.show_configuration();
    bt.bench_evaluation(c, "aggregate_small_incremental");
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_join_translation, bench_join_tiny, bench_join_small,
        bench_aggregate_small, bench_aggregate_small_incremental
}

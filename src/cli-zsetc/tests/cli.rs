use circuit::{Circuit, OperatorKind};
use common::catalog::Catalog;
use common::database::Database;
use common::logical_plan::*;
use common::testutil::*;
use common::SqlOperator;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const DDL: &str = "CREATE TABLE t (a INT NOT NULL, b INT NOT NULL);";

/// `SELECT a FROM t WHERE b > 1`.
fn filter_plan() -> LogicalPlan {
    let db = Database::from_ddl("cli", DDL).unwrap();
    let mut plan = LogicalPlan::new();
    let project = plan.add_node(LogicalOp::Project(ProjectNode {
        exprs: vec![RexNode::input_ref(0, int())],
        schema: schema(&[("a", int())]),
    }));
    let filter = plan.add_node(LogicalOp::Filter(FilterNode {
        condition: RexNode::compare(
            SqlOperator::GreaterThan,
            RexNode::input_ref(1, int()),
            RexNode::literal(common::Field::IntField(1), int()),
        ),
        schema: db.get_table_schema("t").unwrap(),
    }));
    let scan = plan.add_node(LogicalOp::Scan(ScanNode {
        table: String::from("t"),
        schema: db.get_table_schema("t").unwrap(),
    }));
    plan.add_edge(project, filter);
    plan.add_edge(filter, scan);
    plan
}

/// Writes the ddl, a plan file with views `v` and `hidden`, and a csv for `t`.
fn setup() -> PathBuf {
    let dir = gen_random_dir();
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("schema.sql"), DDL).unwrap();
    let plan = filter_plan().to_json();
    let views = json!([
        {"view": "v", "plan": plan},
        {"view": "hidden", "plan": plan, "emit_output": false},
    ]);
    fs::write(dir.join("plan.json"), views.to_string()).unwrap();
    fs::write(dir.join("t.csv"), "1,1\n2,5\n3,7\n").unwrap();
    dir
}

fn zsetc(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_zsetc"))
        .arg("--ddl")
        .arg(dir.join("schema.sql"))
        .arg("--plan")
        .arg(dir.join("plan.json"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

#[test]
fn test_compile_to_stdout() {
    let dir = setup();
    let output = zsetc(&dir, &[]);
    assert!(output.status.success());
    let circuit = Circuit::from_json(&String::from_utf8(output.stdout).unwrap()).unwrap();
    assert_eq!(circuit.inputs().len(), 1);
    assert_eq!(circuit.outputs().len(), 1);
    assert!(circuit
        .operators()
        .iter()
        .any(|op| op.kind == OperatorKind::Noop && op.name.as_deref() == Some("hidden")));
    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_select_view_and_cbor_output() {
    let dir = setup();
    let target = dir.join("circuit.cbor");
    let output = zsetc(
        &dir,
        &[
            "--view",
            "v",
            "--cbor",
            "--inputs-from-tables",
            "--output",
            target.to_str().unwrap(),
        ],
    );
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let circuit = Circuit::from_cbor(&fs::read(&target).unwrap()).unwrap();
    assert!(circuit.get_operator("hidden").is_none());
    assert_eq!(circuit.outputs().len(), 1);
    let source = circuit.get_operator("t").unwrap();
    assert!(source.comment.as_deref().unwrap_or("").contains("CREATE TABLE t"));
    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_evaluate_with_data() {
    let dir = setup();
    let data = format!("t={}", dir.join("t.csv").to_str().unwrap());
    let output = zsetc(&dir, &["--data", &data]);
    assert!(output.status.success());
    let printed = String::from_utf8(output.stdout).unwrap();
    assert_eq!(printed, "v:\n(a)\n(2) => 1\n(3) => 1\n");
    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_failures_exit_with_error() {
    let dir = setup();
    let unknown = zsetc(&dir, &["--view", "nowhere"]);
    assert!(!unknown.status.success());
    assert!(String::from_utf8_lossy(&unknown.stderr).contains("View nowhere not found"));

    let bad_data = zsetc(&dir, &["--data", "t"]);
    assert!(!bad_data.status.success());
    fs::remove_dir_all(dir).unwrap();
}

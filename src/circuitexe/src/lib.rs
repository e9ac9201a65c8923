//! Reference interpreter for circuits: Z-set algebra, the scalar runtime library and a step-wise
//! runner.
#[macro_use]
extern crate log;

pub mod eval;
pub mod runner;
pub mod sqllib;
pub mod value;
pub mod zset;

pub use eval::Evaluator;
pub use runner::CircuitRunner;
pub use value::Value;
pub use zset::ZSet;

use common::{Field, TableSchema};

/// A Z-set holding each row once.
///
/// # Arguments
///
/// * `rows` - Rows, as imported by `common::csv_utils`.
pub fn zset_from_rows(rows: Vec<Vec<Field>>) -> ZSet {
    ZSet::from_rows(rows.into_iter().map(|r| (Value::row(r), 1)))
}

/// Renders a Z-set as one `row => weight` line per row, headed by the column names.
pub fn render(schema: Option<&TableSchema>, zset: &ZSet) -> String {
    let mut res = String::new();
    if let Some(schema) = schema {
        let names: Vec<&str> = schema.attributes().map(|a| a.name()).collect();
        res += &format!("({})\n", names.join(", "));
    }
    for (row, weight) in zset.iter() {
        res += &format!("{} => {}\n", row, weight);
    }
    res
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_render() {
        let z = zset_from_rows(vec![vec![Field::IntField(1)], vec![Field::IntField(1)]]);
        assert_eq!(render(None, &z), "(1) => 2\n");
        let schema = common::testutil::schema(&[("a", common::testutil::int())]);
        assert_eq!(render(Some(&schema), &z), "(a)\n(1) => 2\n");
    }
}

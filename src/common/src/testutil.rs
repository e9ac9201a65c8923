use crate::{Attribute, DataType, Field, SqlType, TableSchema};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::env;
use std::path::PathBuf;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Shorthand for a non-nullable INTEGER.
pub fn int() -> SqlType {
    SqlType::not_null(DataType::Int)
}

/// Shorthand for a nullable INTEGER.
pub fn nullable_int() -> SqlType {
    SqlType::nullable(DataType::Int)
}

/// Builds a schema from `(name, type)` pairs.
pub fn schema(columns: &[(&str, SqlType)]) -> TableSchema {
    TableSchema::new(
        columns
            .iter()
            .map(|(name, ty)| Attribute::new(name.to_string(), ty.dtype, ty.nullable))
            .collect(),
    )
}

/// Random rows of `width` integers in `0..max`.
pub fn gen_random_int_rows<R: Rng>(rng: &mut R, n: usize, width: usize, max: i64) -> Vec<Vec<Field>> {
    (0..n)
        .map(|_| (0..width).map(|_| Field::IntField(rng.gen_range(0..max))).collect())
        .collect()
}

pub fn gen_rand_string(n: usize) -> String {
    thread_rng()
        .sample_iter(Alphanumeric)
        .take(n)
        .map(char::from)
        .collect()
}

pub fn gen_random_dir() -> PathBuf {
    init();
    let mut dir = env::temp_dir();
    dir.push(String::from("zsetc"));
    let rand_string = gen_rand_string(10);
    dir.push(rand_string);
    dir
}

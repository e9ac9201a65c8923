use crate::value::Value;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

/// A finite map from rows to non-zero integer weights.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ZSet {
    rows: BTreeMap<Value, i64>,
}

impl ZSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a Z-set, adding up the weights of repeated rows.
    pub fn from_rows<I: IntoIterator<Item = (Value, i64)>>(rows: I) -> Self {
        let mut result = ZSet::new();
        for (row, weight) in rows {
            result.insert(row, weight);
        }
        result
    }

    /// Adds `weight` to the weight of `row`.
    pub fn insert(&mut self, row: Value, weight: i64) {
        if weight == 0 {
            return;
        }
        match self.rows.entry(row) {
            btree_map::Entry::Vacant(e) => {
                e.insert(weight);
            }
            btree_map::Entry::Occupied(mut e) => {
                let w = e.get().wrapping_add(weight);
                if w == 0 {
                    e.remove();
                } else {
                    *e.get_mut() = w;
                }
            }
        }
    }

    pub fn weight(&self, row: &Value) -> i64 {
        self.rows.get(row).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, i64)> {
        self.rows.iter().map(|(v, w)| (v, *w))
    }

    pub fn plus(&self, other: &ZSet) -> ZSet {
        let mut result = self.clone();
        for (row, weight) in other.iter() {
            result.insert(row.clone(), weight);
        }
        result
    }

    pub fn negate(&self) -> ZSet {
        ZSet {
            rows: self.rows.iter().map(|(v, w)| (v.clone(), -w)).collect(),
        }
    }

    pub fn minus(&self, other: &ZSet) -> ZSet {
        self.plus(&other.negate())
    }

    /// Rows with positive weight, each with weight 1.
    pub fn distinct(&self) -> ZSet {
        ZSet {
            rows: self
                .rows
                .iter()
                .filter(|(_, w)| **w > 0)
                .map(|(v, _)| (v.clone(), 1))
                .collect(),
        }
    }

    /// Sum of the weights.
    pub fn count(&self) -> i64 {
        self.rows.values().sum()
    }

    /// Groups the `(key, value)` pairs of an indexed Z-set by key.
    pub fn group_by_key(&self) -> Result<BTreeMap<Value, Vec<(Value, i64)>>, common::CompilerError> {
        let mut groups: BTreeMap<Value, Vec<(Value, i64)>> = BTreeMap::new();
        for (row, weight) in self.iter() {
            let (key, value) = row.split_pair()?;
            groups
                .entry(key.clone())
                .or_insert_with(Vec::new)
                .push((value.clone(), weight));
        }
        Ok(groups)
    }
}

impl fmt::Display for ZSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<String> = self
            .rows
            .iter()
            .map(|(v, w)| format!("{} => {}", v, w))
            .collect();
        write!(f, "{{{}}}", rows.join(", "))
    }
}

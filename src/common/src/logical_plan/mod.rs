use crate::plan_graph::{NodeIndex, PlanGraph};
use crate::CompilerError;
pub use logical_op::*;
pub use rex::*;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
mod logical_op;
mod rex;
use std::default::Default;
use std::fmt;

/// OpIndex is used to identify nodes in the LogicalPlan.
pub type OpIndex = NodeIndex;

/// Graph where nodes represent relational operations and edges represent the flow of data.
///
/// The plan is a DAG: a node may feed several consumers.
pub struct LogicalPlan {
    /// Graph of the logical plan. Edges go from a consumer to its inputs.
    dataflow: PlanGraph<LogicalOp>,
    /// The root represents final output operation. Root does not work if the graph contains any unconnected components.
    root: Option<OpIndex>,
}

impl Default for LogicalPlan {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicalPlan {
    /// Creates an empty logical plan.
    pub fn new() -> Self {
        Self {
            dataflow: PlanGraph::new(),
            root: None,
        }
    }

    /// Adds a node with an associated LogicalOp to the logical plan and returns the index of the added node.
    ///
    /// # Arguments
    ///
    /// * `operator` - Operator to add to the logical plan.
    pub fn add_node(&mut self, operator: LogicalOp) -> OpIndex {
        let index = self.dataflow.add_node(operator);
        if self.root.is_none() {
            self.root = Some(index)
        }
        index
    }

    /// Adds an edge from source to target.
    ///
    /// In the logical plan representation data flows from target to source. The order in which
    /// edges are added to a source is the order of its inputs.
    ///
    /// # Arguments
    ///
    /// * `source` - Data consumer.
    /// * `target` - Data producer.
    ///
    /// # Panics
    ///
    /// Panics if either index was not returned by `add_node` on this plan.
    pub fn add_edge(&mut self, source: OpIndex, target: OpIndex) {
        if let Some(index) = self.root {
            if index == target {
                self.root = Some(source);
            }
        }
        self.dataflow.add_edge(source, target);
    }

    /// Returns an iterator over the inputs of `from`, in order.
    ///
    /// # Arguments
    ///
    /// * `from` - Node to get the edges of.
    pub fn edges<'a>(&'a self, from: OpIndex) -> impl Iterator<Item = NodeIndex> + 'a {
        self.dataflow.edges(from)
    }

    /// Inputs of `node`, in order.
    pub fn inputs(&self, node: OpIndex) -> Vec<OpIndex> {
        self.edges(node).collect()
    }

    /// Gets the index of the root node, if such a node is present.
    ///
    /// The root node represents the final output operation in the logical plan.
    pub fn root(&self) -> Option<OpIndex> {
        self.root
    }

    /// Returns the LogicalOp associated with a node.
    ///
    /// # Arguments
    ///
    /// * `index` - Index of the node to get the logical operation of.
    pub fn get_operator(&self, index: OpIndex) -> Option<&LogicalOp> {
        self.dataflow.node_data(index)
    }

    /// Returns the total number of nodes present in the graph.
    pub fn node_count(&self) -> usize {
        self.dataflow.node_count()
    }

    /// Returns the total number of edges present in the graph.
    pub fn edge_count(&self) -> usize {
        self.dataflow.edge_count()
    }

    /// Nodes reachable from the root, inputs before consumers. Shared nodes appear once.
    pub fn post_order(&self) -> Vec<OpIndex> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        if let Some(root) = self.root {
            // Explicit stack; the flag marks a node whose inputs were already pushed.
            let mut stack = vec![(root, false)];
            while let Some((node, expanded)) = stack.pop() {
                if expanded {
                    order.push(node);
                    continue;
                }
                if !visited.insert(node) {
                    continue;
                }
                stack.push((node, true));
                let inputs = self.inputs(node);
                for input in inputs.into_iter().rev() {
                    if !visited.contains(&input) {
                        stack.push((input, false));
                    }
                }
            }
        }
        order
    }

    /// Serializes the Logical Plan as json.
    pub fn to_json(&self) -> serde_json::Value {
        let mut node_map = HashMap::new();
        let mut edge_map: HashMap<String, Vec<String>> = HashMap::new();
        for (i, node) in self.dataflow.node_references() {
            node_map.insert(i.to_string(), node);
        }
        for edge in self.dataflow.edge_references() {
            let targets = edge_map
                .entry(edge.source().to_string())
                .or_insert_with(Vec::new);
            targets.push(edge.target().to_string());
        }
        json!({"nodes":node_map,
               "edges":edge_map,
               "root":self.root.map(|i| i.to_string())})
    }

    fn map_compiler_err<T>(
        result: serde_json::Result<T>,
        context: &str,
    ) -> Result<T, CompilerError> {
        result.map_err(|e| {
            CompilerError::ParseError(format!("Malformatted logical plan json ({}): {}", context, e))
        })
    }

    /// De-Serializes a json representation of the Logical Plan created in to_json
    pub fn from_json(json: &str) -> Result<Self, CompilerError> {
        let v: Value = LogicalPlan::map_compiler_err(serde_json::from_str(json), "document")?;
        Self::from_value(&v)
    }

    /// De-Serializes an already parsed json document.
    ///
    /// Node keys that are numbers keep their relative order, so node indices are stable.
    pub fn from_value(v: &Value) -> Result<Self, CompilerError> {
        let malformed = |what: &str| {
            CompilerError::ParseError(format!("Malformatted logical plan json: {}", what))
        };
        let nodes: HashMap<String, LogicalOp> =
            LogicalPlan::map_compiler_err(serde_json::from_value(v["nodes"].clone()), "nodes")?;
        let edges: HashMap<String, Vec<String>> = if v["edges"].is_null() {
            HashMap::new()
        } else {
            LogicalPlan::map_compiler_err(serde_json::from_value(v["edges"].clone()), "edges")?
        };
        let root: Option<String> =
            LogicalPlan::map_compiler_err(serde_json::from_value(v["root"].clone()), "root")?;

        let mut keyed: BTreeMap<(u64, String), LogicalOp> = BTreeMap::new();
        for (key, op) in nodes.into_iter() {
            let rank = key.parse::<u64>().unwrap_or(u64::max_value());
            keyed.insert((rank, key), op);
        }
        let mut graph_map = HashMap::new();
        let mut plan = LogicalPlan::new();
        for ((_, key), op) in keyed.into_iter() {
            let node = plan.dataflow.add_node(op);
            graph_map.insert(key, node);
        }

        if let Some(i) = root {
            let root_node = graph_map
                .get(&i)
                .ok_or_else(|| malformed(&format!("unknown root {}", i)))?;
            plan.root = Some(*root_node);
        }

        let mut sources: Vec<&String> = edges.keys().collect();
        sources.sort();
        for source in sources {
            let source_node = graph_map
                .get(source)
                .ok_or_else(|| malformed(&format!("unknown node {}", source)))?;
            for target in &edges[source] {
                let target_node = graph_map
                    .get(target)
                    .ok_or_else(|| malformed(&format!("unknown node {}", target)))?;
                plan.dataflow.add_edge(*source_node, *target_node);
            }
        }
        Ok(plan)
    }
}

impl fmt::Display for LogicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{DataType, SqlType, TableSchema};

    fn scan(name: &str) -> LogicalOp {
        LogicalOp::Scan(ScanNode {
            table: name.to_string(),
            schema: TableSchema::from_vecs(vec!["a"], vec![SqlType::not_null(DataType::Int)]),
        })
    }

    fn union() -> LogicalOp {
        LogicalOp::Union(SetOpNode {
            all: true,
            schema: TableSchema::from_vecs(vec!["a"], vec![SqlType::not_null(DataType::Int)]),
        })
    }

    #[test]
    fn test_new() {
        let lp = LogicalPlan::new();
        assert_eq!(lp.node_count(), 0);
        assert_eq!(lp.edge_count(), 0);
        assert_eq!(lp.root, None);
        assert!(lp.post_order().is_empty());
    }

    #[test]
    fn test_add_edge() {
        let count = 10;
        let mut lp = LogicalPlan::new();
        let mut prev = lp.add_node(scan("0"));
        for i in 0..count {
            let curr = lp.add_node(scan(&i.to_string()));
            lp.add_edge(curr, prev);
            prev = curr;
        }
        assert_eq!(lp.root, Some(prev));
        assert_eq!(lp.edge_count(), count);
    }

    #[test]
    #[should_panic]
    fn test_add_edge_foreign_index() {
        let mut other = LogicalPlan::new();
        other.add_node(scan("a"));
        let foreign = other.add_node(scan("b"));
        let mut lp = LogicalPlan::new();
        let only = lp.add_node(scan("c"));
        lp.add_edge(only, foreign);
    }

    #[test]
    fn test_inputs_keep_order() {
        let mut lp = LogicalPlan::new();
        let left = lp.add_node(scan("left"));
        let right = lp.add_node(scan("right"));
        let parent = lp.add_node(union());
        lp.add_edge(parent, left);
        lp.add_edge(parent, right);
        assert_eq!(lp.inputs(parent), vec![left, right]);
        assert_eq!(lp.root(), Some(parent));
    }

    #[test]
    fn test_post_order_shared_node() {
        let mut lp = LogicalPlan::new();
        let shared = lp.add_node(scan("t"));
        let u1 = lp.add_node(union());
        lp.add_edge(u1, shared);
        lp.add_edge(u1, shared);
        let u2 = lp.add_node(union());
        lp.add_edge(u2, u1);
        lp.add_edge(u2, shared);
        assert_eq!(lp.post_order(), vec![shared, u1, u2]);
    }

    #[test]
    fn test_get_operator() {
        let mut lp = LogicalPlan::new();
        let index = lp.add_node(scan("T"));
        match lp.get_operator(index) {
            Some(LogicalOp::Scan(s)) => assert_eq!(s.table, "T"),
            _ => panic!("Incorrect operator"),
        }
        assert!(lp.get_operator(NodeIndex::new(7)).is_none());
    }

    #[test]
    fn test_json() {
        let mut lp = LogicalPlan::new();
        let left = lp.add_node(scan("L"));
        let right = lp.add_node(scan("R"));
        let u = lp.add_node(union());
        lp.add_edge(u, left);
        lp.add_edge(u, right);
        let json = lp.to_json();
        let new_lp = LogicalPlan::from_json(&json.to_string()).unwrap();
        assert_eq!(lp.node_count(), new_lp.node_count());
        assert_eq!(lp.edge_count(), new_lp.edge_count());
        let root = new_lp.root().unwrap();
        match new_lp.get_operator(root) {
            Some(LogicalOp::Union(_)) => (),
            _ => panic!("Incorrect root"),
        }
        let names: Vec<String> = new_lp
            .inputs(root)
            .into_iter()
            .map(|i| match new_lp.get_operator(i) {
                Some(LogicalOp::Scan(s)) => s.table.clone(),
                _ => panic!("Incorrect input"),
            })
            .collect();
        assert_eq!(names, vec!["L", "R"]);
    }

    #[test]
    fn test_malformed_json() {
        let err = LogicalPlan::from_json("{\"nodes\": {}, \"root\": \"3\"}");
        assert!(err.is_err());
        assert!(LogicalPlan::from_json("not json").is_err());
    }
}

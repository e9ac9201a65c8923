use std::fmt;

/// Identifies a node inside a `PlanGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub fn new(index: usize) -> Self {
        NodeIndex(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed edge. Edges keep the order in which they were added to their source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    source: NodeIndex,
    target: NodeIndex,
}

impl Edge {
    pub fn source(&self) -> NodeIndex {
        self.source
    }

    pub fn target(&self) -> NodeIndex {
        self.target
    }
}

struct Node<T> {
    data: T,
    outgoing: Vec<NodeIndex>,
}

/// Arena backed directed graph.
///
/// Nodes are never removed, so a `NodeIndex` stays valid for the life of the graph.
pub struct PlanGraph<T> {
    nodes: Vec<Node<T>>,
    edge_count: usize,
}

impl<T> Default for PlanGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PlanGraph<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edge_count: 0,
        }
    }

    /// Adds a node and returns its index.
    pub fn add_node(&mut self, data: T) -> NodeIndex {
        self.nodes.push(Node {
            data,
            outgoing: Vec::new(),
        });
        NodeIndex(self.nodes.len() - 1)
    }

    /// Adds an edge from `source` to `target`.
    ///
    /// # Panics
    ///
    /// Panics if either index does not belong to the graph.
    pub fn add_edge(&mut self, source: NodeIndex, target: NodeIndex) {
        assert!(target.0 < self.nodes.len(), "edge target out of bounds");
        self.nodes[source.0].outgoing.push(target);
        self.edge_count += 1;
    }

    /// Targets of the edges leaving `from`, in insertion order.
    pub fn edges<'a>(&'a self, from: NodeIndex) -> impl Iterator<Item = NodeIndex> + 'a {
        self.nodes
            .get(from.0)
            .into_iter()
            .flat_map(|n| n.outgoing.iter().copied())
    }

    pub fn node_data(&self, index: NodeIndex) -> Option<&T> {
        self.nodes.get(index.0).map(|n| &n.data)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn node_references(&self) -> impl Iterator<Item = (NodeIndex, &T)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeIndex(i), &n.data))
    }

    pub fn edge_references(&self) -> impl Iterator<Item = Edge> + '_ {
        self.nodes.iter().enumerate().flat_map(|(i, n)| {
            n.outgoing.iter().map(move |t| Edge {
                source: NodeIndex(i),
                target: *t,
            })
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_edges_keep_order() {
        let mut g = PlanGraph::new();
        let a = g.add_node("a");
        let b = g.add_node("b");
        let c = g.add_node("c");
        g.add_edge(a, c);
        g.add_edge(a, b);
        g.add_edge(a, c);
        assert_eq!(g.edges(a).collect::<Vec<_>>(), vec![c, b, c]);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.edges(b).count(), 0);
        let sources: Vec<_> = g.edge_references().map(|e| e.source()).collect();
        assert_eq!(sources, vec![a, a, a]);
    }
}

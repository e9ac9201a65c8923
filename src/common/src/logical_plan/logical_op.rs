use super::rex::{RexLiteral, RexNode};
use crate::{SqlType, TableSchema};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A LogicalOp represents a relational operation present in a logical query plan.
///
/// Every variant carries the fully resolved type of the rows it produces.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum LogicalOp {
    Scan(ScanNode),
    Project(ProjectNode),
    Filter(FilterNode),
    Aggregate(AggregateNode),
    Join(JoinNode),
    Union(SetOpNode),
    Minus(SetOpNode),
    Intersect(SetOpNode),
    Window(WindowNode),
    Sort(SortNode),
    Values(ValuesNode),
}

impl LogicalOp {
    /// Output row type of the operation.
    pub fn schema(&self) -> &TableSchema {
        match self {
            LogicalOp::Scan(n) => &n.schema,
            LogicalOp::Project(n) => &n.schema,
            LogicalOp::Filter(n) => &n.schema,
            LogicalOp::Aggregate(n) => &n.schema,
            LogicalOp::Join(n) => &n.schema,
            LogicalOp::Union(n) | LogicalOp::Minus(n) | LogicalOp::Intersect(n) => &n.schema,
            LogicalOp::Window(n) => &n.schema,
            LogicalOp::Sort(n) => &n.schema,
            LogicalOp::Values(n) => &n.schema,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            LogicalOp::Scan(_) => "Scan",
            LogicalOp::Project(_) => "Project",
            LogicalOp::Filter(_) => "Filter",
            LogicalOp::Aggregate(_) => "Aggregate",
            LogicalOp::Join(_) => "Join",
            LogicalOp::Union(_) => "Union",
            LogicalOp::Minus(_) => "Minus",
            LogicalOp::Intersect(_) => "Intersect",
            LogicalOp::Window(_) => "Window",
            LogicalOp::Sort(_) => "Sort",
            LogicalOp::Values(_) => "Values",
        }
    }
}

/// Scan node.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScanNode {
    /// Table or view being read.
    pub table: String,
    pub schema: TableSchema,
}

/// Projection node.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProjectNode {
    /// One expression per output column.
    pub exprs: Vec<RexNode>,
    pub schema: TableSchema,
}

/// Filter node.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FilterNode {
    /// Predicate to filter by.
    pub condition: RexNode,
    pub schema: TableSchema,
}

/// Aggregation functions.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggFunction {
    Count,
    Min,
    Max,
    Sum,
    /// SUM whose result over an empty set is zero.
    Sum0,
    Avg,
}

impl fmt::Display for AggFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggFunction::Count => write!(f, "COUNT"),
            AggFunction::Min => write!(f, "MIN"),
            AggFunction::Max => write!(f, "MAX"),
            AggFunction::Sum => write!(f, "SUM"),
            AggFunction::Sum0 => write!(f, "$SUM0"),
            AggFunction::Avg => write!(f, "AVG"),
        }
    }
}

/// One aggregate function application.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AggregateCall {
    pub function: AggFunction,
    #[serde(default)]
    pub distinct: bool,
    /// Input columns; empty for `COUNT(*)`.
    #[serde(default)]
    pub args: Vec<usize>,
    /// Declared result type.
    pub ty: SqlType,
    #[serde(default)]
    pub name: Option<String>,
}

impl AggregateCall {
    pub fn new(function: AggFunction, args: Vec<usize>, ty: SqlType) -> Self {
        Self {
            function,
            distinct: false,
            args,
            ty,
            name: None,
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

impl fmt::Display for AggregateCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.args.iter().map(|a| format!("${}", a)).collect();
        let args = if args.is_empty() {
            String::from("*")
        } else {
            args.join(", ")
        };
        if self.distinct {
            write!(f, "{}(DISTINCT {})", self.function, args)
        } else {
            write!(f, "{}({})", self.function, args)
        }
    }
}

/// Aggregation node. Output columns are the group keys followed by one column per call.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AggregateNode {
    pub group_keys: Vec<usize>,
    pub aggregates: Vec<AggregateCall>,
    pub schema: TableSchema,
}

/// Join flavors.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Semi,
    Anti,
}

/// Join node. The condition refers to the concatenation of the left and right rows.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JoinNode {
    pub join_type: JoinType,
    pub condition: RexNode,
    pub schema: TableSchema,
}

/// Node for UNION, EXCEPT and INTERSECT.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SetOpNode {
    /// Multiset semantics (the ALL variants).
    pub all: bool,
    pub schema: TableSchema,
}

/// Sort direction of one key.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
    StrictlyAscending,
    StrictlyDescending,
    Clustered,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct FieldCollation {
    pub field: usize,
    pub direction: Direction,
}

impl FieldCollation {
    pub fn new(field: usize, direction: Direction) -> Self {
        Self { field, direction }
    }
}

/// Sort node.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SortNode {
    pub collation: Vec<FieldCollation>,
    /// LIMIT, if any.
    #[serde(default)]
    pub fetch: Option<RexNode>,
    pub schema: TableSchema,
}

/// One end of a window frame.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum WindowBound {
    UnboundedPreceding,
    Preceding(RexNode),
    CurrentRow,
    Following(RexNode),
    UnboundedFollowing,
}

impl WindowBound {
    pub fn is_preceding(&self) -> bool {
        match self {
            WindowBound::UnboundedPreceding | WindowBound::Preceding(_) => true,
            _ => false,
        }
    }
}

/// The functions of one `OVER` clause.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WindowGroup {
    /// PARTITION BY columns.
    pub keys: Vec<usize>,
    pub order_keys: Vec<FieldCollation>,
    pub lower: WindowBound,
    pub upper: WindowBound,
    pub aggregate_calls: Vec<AggregateCall>,
}

/// Window node. Output is the input row extended with one column per aggregate call, group by group.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WindowNode {
    pub groups: Vec<WindowGroup>,
    /// Literals referenced by frame offsets through input references past the end of the input row.
    #[serde(default)]
    pub constants: Vec<RexLiteral>,
    pub schema: TableSchema,
}

/// Literal relation.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValuesNode {
    pub tuples: Vec<Vec<RexLiteral>>,
    pub schema: TableSchema,
}

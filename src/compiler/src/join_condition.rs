use common::logical_plan::RexNode;
use common::{CompilerError, SqlOperator, SqlType};

/// An equality between a column of the left input and a column of the right input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqualityTest {
    pub left_column: usize,
    /// Index within the right input row.
    pub right_column: usize,
    /// Type both columns are compared at.
    pub common_type: SqlType,
}

/// A join predicate split into equi-join keys and whatever is left.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionDecomposition {
    pub comparisons: Vec<EqualityTest>,
    pub residual: Option<RexNode>,
}

impl ConditionDecomposition {
    /// Left key columns, in key order.
    pub fn left_columns(&self) -> Vec<usize> {
        self.comparisons.iter().map(|c| c.left_column).collect()
    }

    /// Right key columns, in key order.
    pub fn right_columns(&self) -> Vec<usize> {
        self.comparisons.iter().map(|c| c.right_column).collect()
    }
}

/// Splits join predicates over the concatenation of a left and a right row.
///
/// Conjuncts are consumed in order. Equalities between a left and a right column become keys until
/// the first conjunct that is not one; that conjunct and every conjunct after it form the residual.
pub struct JoinConditionAnalyzer {
    left_columns: usize,
}

impl JoinConditionAnalyzer {
    /// # Arguments
    ///
    /// * `left_columns` - Width of the left input row.
    pub fn new(left_columns: usize) -> Self {
        Self { left_columns }
    }

    pub fn analyze(&self, condition: &RexNode) -> Result<ConditionDecomposition, CompilerError> {
        let mut conjuncts = Vec::new();
        flatten_and(condition, &mut conjuncts);
        let mut comparisons = Vec::new();
        let mut residual = None;
        for (i, conjunct) in conjuncts.iter().enumerate() {
            match self.equality(conjunct)? {
                Some(test) => comparisons.push(test),
                None => {
                    let rest: Vec<RexNode> = conjuncts[i..].iter().map(|c| (*c).clone()).collect();
                    residual = Some(RexNode::and(rest));
                    break;
                }
            }
        }
        trace!(
            "Join condition {} has {} keys, residual {:?}",
            condition,
            comparisons.len(),
            residual.as_ref().map(|r| r.to_string())
        );
        Ok(ConditionDecomposition {
            comparisons,
            residual,
        })
    }

    fn equality(&self, conjunct: &RexNode) -> Result<Option<EqualityTest>, CompilerError> {
        let operands = match conjunct {
            RexNode::Call {
                op: SqlOperator::Equals,
                operands,
                ..
            } if operands.len() == 2 => operands,
            _ => return Ok(None),
        };
        let (a, a_ty, b, b_ty) = match (&operands[0], &operands[1]) {
            (
                RexNode::InputRef { index: a, ty: a_ty },
                RexNode::InputRef { index: b, ty: b_ty },
            ) => (*a, *a_ty, *b, *b_ty),
            _ => return Ok(None),
        };
        let (left, right) = if a < self.left_columns && b >= self.left_columns {
            (a, b)
        } else if b < self.left_columns && a >= self.left_columns {
            (b, a)
        } else {
            return Ok(None);
        };
        Ok(Some(EqualityTest {
            left_column: left,
            right_column: right - self.left_columns,
            common_type: a_ty.common(b_ty)?,
        }))
    }
}

fn flatten_and<'a>(node: &'a RexNode, out: &mut Vec<&'a RexNode>) {
    match node {
        RexNode::Call {
            op: SqlOperator::And,
            operands,
            ..
        } => {
            for operand in operands {
                flatten_and(operand, out);
            }
        }
        other => out.push(other),
    }
}

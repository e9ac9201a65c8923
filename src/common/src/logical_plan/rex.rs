use crate::{DataType, Field, SqlType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar operators that can appear in a row expression.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub enum SqlOperator {
    And,
    Or,
    Not,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEq,
    GreaterThan,
    GreaterThanOrEq,
    Plus,
    Minus,
    Times,
    Divide,
    Mod,
    UnaryMinus,
    IsNull,
    IsNotNull,
    IsTrue,
    IsFalse,
    IsNotTrue,
    IsNotFalse,
    Cast,
    /// Operands are `when_1, then_1, ..., when_n, then_n, else`.
    Case,
    /// A named built-in function.
    Function(String),
}

impl SqlOperator {
    pub fn is_comparison(&self) -> bool {
        match self {
            SqlOperator::Equals
            | SqlOperator::NotEquals
            | SqlOperator::LessThan
            | SqlOperator::LessThanOrEq
            | SqlOperator::GreaterThan
            | SqlOperator::GreaterThanOrEq => true,
            _ => false,
        }
    }
}

impl fmt::Display for SqlOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SqlOperator::And => "AND",
            SqlOperator::Or => "OR",
            SqlOperator::Not => "NOT",
            SqlOperator::Equals => "=",
            SqlOperator::NotEquals => "<>",
            SqlOperator::LessThan => "<",
            SqlOperator::LessThanOrEq => "<=",
            SqlOperator::GreaterThan => ">",
            SqlOperator::GreaterThanOrEq => ">=",
            SqlOperator::Plus => "+",
            SqlOperator::Minus => "-",
            SqlOperator::Times => "*",
            SqlOperator::Divide => "/",
            SqlOperator::Mod => "MOD",
            SqlOperator::UnaryMinus => "-",
            SqlOperator::IsNull => "IS NULL",
            SqlOperator::IsNotNull => "IS NOT NULL",
            SqlOperator::IsTrue => "IS TRUE",
            SqlOperator::IsFalse => "IS FALSE",
            SqlOperator::IsNotTrue => "IS NOT TRUE",
            SqlOperator::IsNotFalse => "IS NOT FALSE",
            SqlOperator::Cast => "CAST",
            SqlOperator::Case => "CASE",
            SqlOperator::Function(name) => name,
        };
        write!(f, "{}", s)
    }
}

/// A typed literal.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RexLiteral {
    pub value: Field,
    pub ty: SqlType,
}

impl RexLiteral {
    pub fn new(value: Field, ty: SqlType) -> Self {
        Self { value, ty }
    }

    /// NULL of the given dtype.
    pub fn null(dtype: DataType) -> Self {
        Self::new(Field::Null, SqlType::nullable(dtype))
    }
}

/// Row expression. Every node carries its resolved SQL type.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum RexNode {
    /// Reference to a column of the input row.
    InputRef { index: usize, ty: SqlType },
    Literal(RexLiteral),
    Call {
        op: SqlOperator,
        operands: Vec<RexNode>,
        ty: SqlType,
    },
}

impl RexNode {
    pub fn input_ref(index: usize, ty: SqlType) -> Self {
        RexNode::InputRef { index, ty }
    }

    pub fn literal(value: Field, ty: SqlType) -> Self {
        RexNode::Literal(RexLiteral::new(value, ty))
    }

    pub fn call(op: SqlOperator, operands: Vec<RexNode>, ty: SqlType) -> Self {
        RexNode::Call { op, operands, ty }
    }

    /// Boolean comparison; nullable when either operand is.
    pub fn compare(op: SqlOperator, left: RexNode, right: RexNode) -> Self {
        let nullable = left.ty().nullable || right.ty().nullable;
        RexNode::call(
            op,
            vec![left, right],
            SqlType::new(DataType::Boolean, nullable),
        )
    }

    /// Conjunction of `conjuncts`; a single conjunct is returned unchanged.
    pub fn and(mut conjuncts: Vec<RexNode>) -> Self {
        if conjuncts.len() == 1 {
            return conjuncts.remove(0);
        }
        let nullable = conjuncts.iter().any(|c| c.ty().nullable);
        RexNode::call(
            SqlOperator::And,
            conjuncts,
            SqlType::new(DataType::Boolean, nullable),
        )
    }

    pub fn ty(&self) -> SqlType {
        match self {
            RexNode::InputRef { ty, .. } => *ty,
            RexNode::Literal(lit) => lit.ty,
            RexNode::Call { ty, .. } => *ty,
        }
    }

    /// True for the literal `TRUE`.
    pub fn is_true_literal(&self) -> bool {
        match self {
            RexNode::Literal(lit) => lit.value == Field::BoolField(true),
            _ => false,
        }
    }
}

impl fmt::Display for RexNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RexNode::InputRef { index, .. } => write!(f, "${}", index),
            RexNode::Literal(lit) => write!(f, "{}", lit.value),
            RexNode::Call { op, operands, ty } => {
                let args: Vec<String> = operands.iter().map(|o| o.to_string()).collect();
                match op {
                    SqlOperator::Cast => write!(f, "CAST({} AS {})", args.join(", "), ty),
                    _ if operands.len() == 2 => write!(f, "({} {} {})", args[0], op, args[1]),
                    _ => write!(f, "{}({})", op, args.join(", ")),
                }
            }
        }
    }
}

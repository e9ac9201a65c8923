use crate::types::{ScalarKind, Type};
use common::Field;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators. Arithmetic and comparisons propagate NULL; AND and OR use three-valued logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Division; a zero divisor yields NULL.
    Div,
    /// Remainder; a zero divisor yields NULL.
    Mod,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        match self {
            BinaryOp::Eq
            | BinaryOp::Neq
            | BinaryOp::Lt
            | BinaryOp::Lte
            | BinaryOp::Gt
            | BinaryOp::Gte => true,
            _ => false,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// A closure parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

impl Param {
    pub fn new(name: &str, ty: Type) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }
}

/// Statements inside a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Let { name: String, value: Expr },
    /// `var.index = value`
    FieldAssign { var: String, index: usize, value: Expr },
}

/// Expressions of the circuit. Closures are plain expression trees so they can be serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal {
        value: Field,
        ty: Type,
    },
    Var {
        name: String,
        ty: Type,
    },
    Field {
        expr: Box<Expr>,
        index: usize,
    },
    Tuple(Vec<Expr>),
    RawTuple(Vec<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        ty: Type,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        ty: Type,
    },
    Cast {
        expr: Box<Expr>,
        ty: Type,
    },
    If {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// Call of a runtime library function.
    Apply {
        function: String,
        args: Vec<Expr>,
        ty: Type,
    },
    Closure {
        params: Vec<Param>,
        body: Box<Expr>,
    },
    /// Call of a closure, usually one bound by a local declaration.
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        ty: Type,
    },
    Block {
        statements: Vec<Statement>,
        result: Box<Expr>,
    },
    VecLiteral {
        elements: Vec<Expr>,
        element_type: Type,
    },
    /// An aggregation: `zero`, `increment(acc, row, weight)` and an optional `postprocess(acc)`.
    Fold {
        zero: Box<Expr>,
        increment: Box<Expr>,
        postprocess: Option<Box<Expr>>,
    },
    /// Comparator ordering rows by the result of a key closure.
    Extract(Box<Expr>),
    /// Reversed comparator.
    Rev(Box<Expr>),
    /// Lexicographic combination of two comparators.
    Then(Box<Expr>, Box<Expr>),
    SortBy {
        vec: Box<Expr>,
        comparator: Box<Expr>,
    },
    /// Window frame relative to the current order value.
    RelRange {
        lower: Box<Expr>,
        upper: Box<Expr>,
    },
    RelOffset {
        before: bool,
        value: Box<Expr>,
    },
    ZSetLiteral {
        rows: Vec<(Expr, i64)>,
        element_type: Type,
    },
}

impl Expr {
    pub fn literal(value: Field, ty: Type) -> Self {
        Expr::Literal { value, ty }
    }

    /// NULL of the nullable version of `ty`.
    pub fn null(ty: &Type) -> Self {
        Expr::literal(Field::Null, ty.with_nullable(true))
    }

    pub fn bool(value: bool) -> Self {
        Expr::literal(Field::BoolField(value), Type::bool(false))
    }

    pub fn int(value: i64, ty: Type) -> Self {
        Expr::literal(Field::IntField(value), ty)
    }

    pub fn var(name: &str, ty: Type) -> Self {
        Expr::Var {
            name: name.to_string(),
            ty,
        }
    }

    /// Parameter declaration matching a variable.
    pub fn as_param(&self) -> Param {
        match self {
            Expr::Var { name, ty } => Param::new(name, ty.clone()),
            _ => Param::new("_", self.ty()),
        }
    }

    pub fn field(&self, index: usize) -> Self {
        Expr::Field {
            expr: Box::new(self.clone()),
            index,
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr, ty: Type) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty,
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr, ty: Type) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
            ty,
        }
    }

    pub fn apply(function: &str, args: Vec<Expr>, ty: Type) -> Self {
        Expr::Apply {
            function: function.to_string(),
            args,
            ty,
        }
    }

    pub fn call(callee: Expr, args: Vec<Expr>, ty: Type) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            args,
            ty,
        }
    }

    pub fn if_then_else(condition: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::If {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// Wraps `self` as the body of a closure.
    pub fn closure(self, params: Vec<Param>) -> Self {
        Expr::Closure {
            params,
            body: Box::new(self),
        }
    }

    /// Casts to `ty` unless the expression already has that type.
    pub fn cast(self, ty: &Type) -> Self {
        if self.ty() == *ty {
            self
        } else {
            Expr::Cast {
                expr: Box::new(self),
                ty: ty.clone(),
            }
        }
    }

    /// The type of the value this expression evaluates to.
    pub fn ty(&self) -> Type {
        match self {
            Expr::Literal { ty, .. }
            | Expr::Var { ty, .. }
            | Expr::Binary { ty, .. }
            | Expr::Unary { ty, .. }
            | Expr::Cast { ty, .. }
            | Expr::Apply { ty, .. }
            | Expr::Call { ty, .. } => ty.clone(),
            Expr::Field { expr, index } => expr.ty().field(*index).cloned().unwrap_or(Type::Any),
            Expr::Tuple(fields) => Type::Tuple(fields.iter().map(Expr::ty).collect()),
            Expr::RawTuple(fields) => Type::RawTuple(fields.iter().map(Expr::ty).collect()),
            Expr::If { then, .. } => then.ty(),
            Expr::Block { result, .. } => result.ty(),
            Expr::VecLiteral { element_type, .. } => Type::Vec(Box::new(element_type.clone())),
            Expr::SortBy { vec, .. } => vec.ty(),
            Expr::ZSetLiteral { element_type, .. } => Type::zset(element_type.clone()),
            Expr::Closure { .. }
            | Expr::Fold { .. }
            | Expr::Extract(_)
            | Expr::Rev(_)
            | Expr::Then(_, _)
            | Expr::RelRange { .. }
            | Expr::RelOffset { .. } => Type::Any,
        }
    }

    /// Returns the literal boolean value, if this is a boolean literal.
    pub fn as_bool_literal(&self) -> Option<Option<bool>> {
        match self {
            Expr::Literal {
                value: Field::BoolField(b),
                ..
            } => Some(Some(*b)),
            Expr::Literal {
                value: Field::Null,
                ty:
                    Type::Scalar {
                        kind: ScalarKind::Bool,
                        ..
                    },
            } => Some(None),
            _ => None,
        }
    }

    /// The fields of a tuple expression, spelled out as field accesses when it is not a literal tuple.
    pub fn flatten(&self) -> Vec<Expr> {
        match self {
            Expr::Tuple(fields) => fields.clone(),
            _ => {
                let count = self.ty().fields().map_or(0, |f| f.len());
                (0..count).map(|i| self.field(i)).collect()
            }
        }
    }
}

fn join_exprs(exprs: &[Expr]) -> String {
    exprs
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal { value, ty } => match value {
                Field::Null => write!(f, "None::<{}>", ty),
                v if ty.is_nullable() => write!(f, "Some({})", v),
                v => write!(f, "{}", v),
            },
            Expr::Var { name, .. } => write!(f, "{}", name),
            Expr::Field { expr, index } => write!(f, "{}.{}", expr, index),
            Expr::Tuple(fields) => write!(f, "Tuple{}::new({})", fields.len(), join_exprs(fields)),
            Expr::RawTuple(fields) => {
                if fields.len() == 1 {
                    write!(f, "({},)", fields[0])
                } else {
                    write!(f, "({})", join_exprs(fields))
                }
            }
            Expr::Binary {
                op, left, right, ..
            } => write!(f, "({} {} {})", left, op, right),
            Expr::Unary { op, operand, .. } => match op {
                UnaryOp::Not => write!(f, "!{}", operand),
                UnaryOp::Neg => write!(f, "-{}", operand),
            },
            Expr::Cast { expr, ty } => write!(f, "cast::<{}>({})", ty, expr),
            Expr::If {
                condition,
                then,
                otherwise,
            } => write!(f, "if {} {{ {} }} else {{ {} }}", condition, then, otherwise),
            Expr::Apply { function, args, .. } => write!(f, "{}({})", function, join_exprs(args)),
            Expr::Closure { params, body } => {
                let params: Vec<String> = params
                    .iter()
                    .map(|p| format!("{}: {}", p.name, p.ty))
                    .collect();
                write!(f, "move |{}| {}", params.join(", "), body)
            }
            Expr::Call { callee, args, .. } => write!(f, "{}({})", callee, join_exprs(args)),
            Expr::Block { statements, result } => {
                write!(f, "{{ ")?;
                for s in statements {
                    match s {
                        Statement::Let { name, value } => write!(f, "let {} = {}; ", name, value)?,
                        Statement::FieldAssign { var, index, value } => {
                            write!(f, "{}.{} = {}; ", var, index, value)?
                        }
                    }
                }
                write!(f, "{} }}", result)
            }
            Expr::VecLiteral { elements, .. } => write!(f, "vec![{}]", join_exprs(elements)),
            Expr::Fold {
                zero,
                increment,
                postprocess,
            } => match postprocess {
                Some(post) => write!(f, "Fold::with_output({}, {}, {})", zero, increment, post),
                None => write!(f, "Fold::new({}, {})", zero, increment),
            },
            Expr::Extract(key) => write!(f, "Extract::new({})", key),
            Expr::Rev(c) => write!(f, "{}.rev()", c),
            Expr::Then(a, b) => write!(f, "{}.then({})", a, b),
            Expr::SortBy { vec, comparator } => write!(
                f,
                "{{ let mut v1 = {}.clone(); v1.sort_unstable_by(|a, b| {}.compare(a, b)); v1 }}",
                vec, comparator
            ),
            Expr::RelRange { lower, upper } => write!(f, "RelRange::new({}, {})", lower, upper),
            Expr::RelOffset { before, value } => {
                if *before {
                    write!(f, "RelOffset::Before({})", value)
                } else {
                    write!(f, "RelOffset::After({})", value)
                }
            }
            Expr::ZSetLiteral { rows, .. } => {
                let rows: Vec<String> = rows
                    .iter()
                    .map(|(r, w)| format!("{} => {}", r, w))
                    .collect();
                write!(f, "zset!({})", rows.join(", "))
            }
        }
    }
}

use circuit::{BinaryOp, Expr, Type, UnaryOp};
use common::logical_plan::{RexLiteral, RexNode};
use common::{CompilerError, DataType, Field, SqlOperator, SqlType};

/// Compiles row expressions into circuit expressions.
pub trait ExpressionCompiler {
    /// Compiles `expr`, reading input references from `row`.
    ///
    /// # Arguments
    ///
    /// * `expr` - Expression to compile.
    /// * `row` - Variable bound to the current row, if there is one.
    fn compile(&self, expr: &RexNode, row: Option<&Expr>) -> Result<Expr, CompilerError>;

    /// Compiles `expr` into a closure over a single row variable.
    fn compile_closure(&self, expr: &RexNode, row: &Expr) -> Result<Expr, CompilerError> {
        let body = self.compile(expr, Some(row))?;
        Ok(body.closure(vec![row.as_param()]))
    }
}

/// Expression compiler for SQL row expressions with three-valued NULL semantics.
#[derive(Default)]
pub struct SqlExpressionCompiler {
    /// Literals addressed by input references past the end of the row.
    constants: Vec<RexLiteral>,
}

impl SqlExpressionCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constants(constants: Vec<RexLiteral>) -> Self {
        Self { constants }
    }

    /// Compiles a literal. Integer payloads of floating point literals are widened.
    pub fn literal(lit: &RexLiteral) -> Expr {
        let ty = Type::from_sql(lit.ty);
        if lit.value.is_null() {
            return Expr::null(&ty);
        }
        let value = match (lit.ty.dtype, &lit.value) {
            (DataType::Real, Field::IntField(i)) | (DataType::Double, Field::IntField(i)) => {
                Field::double(*i as f64)
            }
            (DataType::Date, Field::IntField(i)) => Field::DateField(*i as i32),
            (DataType::Timestamp, Field::IntField(i)) => Field::TimestampField(*i),
            (_, v) => v.clone(),
        };
        Expr::literal(value, ty)
    }

    fn input_ref(&self, index: usize, row: Option<&Expr>) -> Result<Expr, CompilerError> {
        let row = row.ok_or_else(|| {
            CompilerError::TranslationError(format!(
                "column ${} referenced without a row",
                index
            ))
        })?;
        let width = row.ty().fields().map_or(0, |f| f.len());
        if index < width {
            return Ok(row.field(index));
        }
        match self.constants.get(index - width) {
            Some(lit) => Ok(Self::literal(lit)),
            None => Err(CompilerError::TranslationError(format!(
                "column ${} out of bounds for a row of {} fields",
                index, width
            ))),
        }
    }

    fn call(
        &self,
        op: &SqlOperator,
        operands: &[RexNode],
        ty: SqlType,
        row: Option<&Expr>,
    ) -> Result<Expr, CompilerError> {
        let mut ops = Vec::with_capacity(operands.len());
        for operand in operands {
            ops.push(self.compile(operand, row)?);
        }
        let target = Type::from_sql(ty);
        let expr = match op {
            SqlOperator::Plus => chain(BinaryOp::Add, &target, ops)?,
            SqlOperator::Times => chain(BinaryOp::Mul, &target, ops)?,
            SqlOperator::And => chain(BinaryOp::And, &target, ops)?,
            SqlOperator::Or => chain(BinaryOp::Or, &target, ops)?,
            SqlOperator::Minus => binary(BinaryOp::Sub, &target, ops)?,
            SqlOperator::Divide => binary(BinaryOp::Div, &target.with_nullable(true), ops)?,
            SqlOperator::Mod => binary(BinaryOp::Mod, &target.with_nullable(true), ops)?,
            SqlOperator::Equals => binary(BinaryOp::Eq, &target, ops)?,
            SqlOperator::NotEquals => binary(BinaryOp::Neq, &target, ops)?,
            SqlOperator::LessThan => binary(BinaryOp::Lt, &target, ops)?,
            SqlOperator::LessThanOrEq => binary(BinaryOp::Lte, &target, ops)?,
            SqlOperator::GreaterThan => binary(BinaryOp::Gt, &target, ops)?,
            SqlOperator::GreaterThanOrEq => binary(BinaryOp::Gte, &target, ops)?,
            SqlOperator::Not => unary(UnaryOp::Not, &target, ops)?,
            SqlOperator::UnaryMinus => unary(UnaryOp::Neg, &target, ops)?,
            SqlOperator::IsNull | SqlOperator::IsNotNull => {
                let arg = single(op, ops)?;
                let is_null = *op == SqlOperator::IsNull;
                if arg.ty().is_nullable() {
                    let name = if is_null { "is_null" } else { "is_not_null" };
                    Expr::apply(name, vec![arg], Type::bool(false))
                } else {
                    Expr::bool(!is_null)
                }
            }
            SqlOperator::IsTrue
            | SqlOperator::IsFalse
            | SqlOperator::IsNotTrue
            | SqlOperator::IsNotFalse => {
                let name = match op {
                    SqlOperator::IsTrue => "is_true",
                    SqlOperator::IsFalse => "is_false",
                    SqlOperator::IsNotTrue => "is_not_true",
                    _ => "is_not_false",
                };
                Expr::apply(name, vec![single(op, ops)?], Type::bool(false))
            }
            SqlOperator::Cast => single(op, ops)?.cast(&target),
            SqlOperator::Case => case(ops, &target)?,
            SqlOperator::Function(name) => function(name, ops, &target)?,
        };
        Ok(expr)
    }
}

impl ExpressionCompiler for SqlExpressionCompiler {
    fn compile(&self, expr: &RexNode, row: Option<&Expr>) -> Result<Expr, CompilerError> {
        trace!("Compiling expression {}", expr);
        match expr {
            RexNode::InputRef { index, .. } => self.input_ref(*index, row),
            RexNode::Literal(lit) => Ok(Self::literal(lit)),
            RexNode::Call { op, operands, ty } => self.call(op, operands, *ty, row),
        }
    }
}

/// Coerces a nullable boolean to a plain one, mapping NULL to false.
pub fn wrap_bool_if_needed(expr: Expr) -> Expr {
    let ty = expr.ty();
    if ty.is_nullable() {
        Expr::apply("wrap_bool", vec![expr], ty.with_nullable(false))
    } else {
        expr
    }
}

/// Type both operands of a binary operation are brought to, ignoring nullability.
fn common_type(left: &Type, right: &Type) -> Result<Type, CompilerError> {
    let (l, r) = match (left.to_sql(), right.to_sql()) {
        (Some(l), Some(r)) => (l, r),
        _ => {
            return Err(CompilerError::Unimplemented(format!(
                "operation between {} and {}",
                left, right
            )))
        }
    };
    Ok(Type::from_sql(l.common(r)?.with_nullable(false)))
}

/// Binary operation with SQL typing: operands are cast to their common type, keeping their own
/// nullability, and the result is cast to `target`.
fn make_binary(op: BinaryOp, target: &Type, left: Expr, right: Expr) -> Result<Expr, CompilerError> {
    let (lt, rt) = (left.ty(), right.ty());
    let common = common_type(&lt, &rt)?;
    if common == Type::Null {
        return Ok(Expr::null(target));
    }
    let left = left.cast(&common.with_nullable(lt.is_nullable()));
    let right = right.cast(&common.with_nullable(rt.is_nullable()));
    let mut nullable = lt.is_nullable() || rt.is_nullable();
    let natural = if op.is_comparison() || op == BinaryOp::And || op == BinaryOp::Or {
        Type::bool(nullable)
    } else {
        if op == BinaryOp::Div || op == BinaryOp::Mod {
            nullable = true;
        }
        common.with_nullable(nullable)
    };
    Ok(Expr::binary(op, left, right, natural).cast(target))
}

fn binary(op: BinaryOp, target: &Type, mut ops: Vec<Expr>) -> Result<Expr, CompilerError> {
    if ops.len() != 2 {
        return Err(CompilerError::TranslationError(format!(
            "{} expects 2 operands, got {}",
            op,
            ops.len()
        )));
    }
    let right = ops.pop();
    let left = ops.pop();
    match (left, right) {
        (Some(l), Some(r)) => make_binary(op, target, l, r),
        _ => Err(CompilerError::TranslationError(format!("missing operand of {}", op))),
    }
}

/// Left-associative chain of a binary operation over two or more operands.
fn chain(op: BinaryOp, target: &Type, ops: Vec<Expr>) -> Result<Expr, CompilerError> {
    if ops.len() < 2 {
        return Err(CompilerError::Unimplemented(format!(
            "{} with {} operands",
            op,
            ops.len()
        )));
    }
    let mut iter = ops.into_iter();
    let mut acc = match iter.next() {
        Some(first) => first,
        None => return Err(CompilerError::TranslationError(format!("empty {}", op))),
    };
    for next in iter {
        let natural = natural_type(op, &acc.ty(), &next.ty())?;
        acc = make_binary(op, &natural, acc, next)?;
    }
    Ok(acc.cast(target))
}

fn natural_type(op: BinaryOp, left: &Type, right: &Type) -> Result<Type, CompilerError> {
    let nullable = left.is_nullable() || right.is_nullable();
    if op == BinaryOp::And || op == BinaryOp::Or {
        return Ok(Type::bool(nullable));
    }
    let common = common_type(left, right)?;
    Ok(common.with_nullable(nullable || common == Type::Null))
}

fn single(op: &SqlOperator, mut ops: Vec<Expr>) -> Result<Expr, CompilerError> {
    if ops.len() != 1 {
        return Err(CompilerError::TranslationError(format!(
            "{} expects 1 operand, got {}",
            op,
            ops.len()
        )));
    }
    ops.pop()
        .ok_or_else(|| CompilerError::TranslationError(format!("missing operand of {}", op)))
}

fn unary(op: UnaryOp, target: &Type, ops: Vec<Expr>) -> Result<Expr, CompilerError> {
    let operand = single(
        &match op {
            UnaryOp::Not => SqlOperator::Not,
            UnaryOp::Neg => SqlOperator::UnaryMinus,
        },
        ops,
    )?;
    let ty = operand.ty();
    Ok(Expr::unary(op, operand, ty).cast(target))
}

/// `CASE WHEN c1 THEN v1 ... ELSE e END`, built from the last branch backwards.
fn case(mut ops: Vec<Expr>, target: &Type) -> Result<Expr, CompilerError> {
    if ops.len() % 2 == 0 {
        // No ELSE branch.
        ops.push(Expr::null(target));
    }
    let mut result = match ops.pop() {
        Some(e) => e.cast(target),
        None => return Err(CompilerError::TranslationError(String::from("empty CASE"))),
    };
    while ops.len() >= 2 {
        let value = ops.pop();
        let condition = ops.pop();
        if let (Some(condition), Some(value)) = (condition, value) {
            result = Expr::if_then_else(wrap_bool_if_needed(condition), value.cast(target), result);
        }
    }
    Ok(result)
}

fn function(name: &str, mut ops: Vec<Expr>, target: &Type) -> Result<Expr, CompilerError> {
    let lower = name.to_lowercase();
    match lower.as_str() {
        "abs" | "lower" | "upper" | "char_length" if ops.len() == 1 => {
            let arg = ops.remove(0);
            let natural = match lower.as_str() {
                "char_length" => Type::i64(arg.ty().is_nullable()),
                _ => arg.ty(),
            };
            Ok(Expr::apply(&lower, vec![arg], natural).cast(target))
        }
        _ => Err(CompilerError::Unimplemented(format!(
            "function {} with {} arguments",
            name,
            ops.len()
        ))),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::testutil::*;

    fn row() -> Expr {
        Expr::var(
            "t",
            Type::Tuple(vec![
                Type::from_sql(int()),
                Type::from_sql(nullable_int()),
                Type::from_sql(SqlType::not_null(DataType::Double)),
            ]),
        )
    }

    #[test]
    fn test_input_ref_and_constants() {
        let ec = SqlExpressionCompiler::with_constants(vec![RexLiteral::new(
            Field::IntField(5),
            SqlType::not_null(DataType::BigInt),
        )]);
        let t = row();
        let e = ec.compile(&RexNode::input_ref(1, nullable_int()), Some(&t)).unwrap();
        assert_eq!(e, t.field(1));
        let c = ec.compile(&RexNode::input_ref(3, int()), Some(&t)).unwrap();
        assert_eq!(c, Expr::int(5, Type::i64(false)));
        assert!(ec.compile(&RexNode::input_ref(4, int()), Some(&t)).is_err());
        assert!(ec.compile(&RexNode::input_ref(0, int()), None).is_err());
    }

    #[test]
    fn test_comparison_keeps_operand_nullability() {
        let ec = SqlExpressionCompiler::new();
        let t = row();
        let cmp = RexNode::compare(
            SqlOperator::LessThan,
            RexNode::input_ref(1, nullable_int()),
            RexNode::input_ref(2, SqlType::not_null(DataType::Double)),
        );
        let e = ec.compile(&cmp, Some(&t)).unwrap();
        assert_eq!(e.ty(), Type::bool(true));
        match e {
            Expr::Binary { left, right, .. } => {
                assert_eq!(left.ty(), Type::f64(true));
                assert_eq!(right.ty(), Type::f64(false));
            }
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn test_division_is_nullable() {
        let ec = SqlExpressionCompiler::new();
        let t = row();
        let div = RexNode::call(
            SqlOperator::Divide,
            vec![RexNode::input_ref(0, int()), RexNode::input_ref(0, int())],
            int(),
        );
        let e = ec.compile(&div, Some(&t)).unwrap();
        assert_eq!(e.ty(), Type::from_sql(nullable_int()));
    }

    #[test]
    fn test_is_null_on_non_nullable_folds() {
        let ec = SqlExpressionCompiler::new();
        let t = row();
        let e = ec
            .compile(
                &RexNode::call(
                    SqlOperator::IsNull,
                    vec![RexNode::input_ref(0, int())],
                    SqlType::not_null(DataType::Boolean),
                ),
                Some(&t),
            )
            .unwrap();
        assert_eq!(e.as_bool_literal(), Some(Some(false)));
    }

    #[test]
    fn test_case_without_else() {
        let ec = SqlExpressionCompiler::new();
        let t = row();
        let when = RexNode::compare(
            SqlOperator::Equals,
            RexNode::input_ref(1, nullable_int()),
            RexNode::literal(Field::IntField(1), int()),
        );
        let case = RexNode::call(
            SqlOperator::Case,
            vec![when, RexNode::input_ref(0, int())],
            nullable_int(),
        );
        match ec.compile(&case, Some(&t)).unwrap() {
            Expr::If {
                condition,
                otherwise,
                ..
            } => {
                assert_eq!(condition.ty(), Type::bool(false));
                assert_eq!(otherwise.as_bool_literal(), None);
                assert_eq!(otherwise.ty(), Type::from_sql(nullable_int()));
            }
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn test_unknown_function() {
        let ec = SqlExpressionCompiler::new();
        let call = RexNode::call(
            SqlOperator::Function(String::from("st_distance")),
            vec![],
            int(),
        );
        match ec.compile(&call, Some(&row())) {
            Err(CompilerError::Unimplemented(_)) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_wrap_bool() {
        let b = Expr::var("b", Type::bool(true));
        assert_eq!(wrap_bool_if_needed(b).ty(), Type::bool(false));
        let c = Expr::bool(true);
        assert_eq!(wrap_bool_if_needed(c.clone()), c);
    }
}

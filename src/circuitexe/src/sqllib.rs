//! Scalar runtime library: SQL arithmetic, comparisons, casts and the helper functions called by
//! compiled closures.
use crate::value::Value;
use circuit::{BinaryOp, ScalarKind, Type, UnaryOp};
use common::{CompilerError, DataType, Field};
use std::cmp::Ordering;

const MILLIS_PER_DAY: i64 = 86_400_000;

fn error(message: String) -> CompilerError {
    CompilerError::ExecutionError(message)
}

/// Orders two non-null scalars; integers and doubles compare numerically.
pub fn compare_fields(left: &Field, right: &Field) -> Result<Ordering, CompilerError> {
    match (left, right) {
        (Field::IntField(_), Field::DoubleField(_)) | (Field::DoubleField(_), Field::IntField(_)) => {
            match (left.as_double(), right.as_double()) {
                (Some(l), Some(r)) => l
                    .partial_cmp(&r)
                    .ok_or_else(|| error(format!("cannot compare {} and {}", left, right))),
                _ => Err(error(format!("cannot compare {} and {}", left, right))),
            }
        }
        (Field::BoolField(_), Field::BoolField(_))
        | (Field::IntField(_), Field::IntField(_))
        | (Field::DoubleField(_), Field::DoubleField(_))
        | (Field::StringField(_), Field::StringField(_))
        | (Field::DateField(_), Field::DateField(_))
        | (Field::TimestampField(_), Field::TimestampField(_)) => Ok(left.cmp(right)),
        _ => Err(error(format!("cannot compare {} and {}", left, right))),
    }
}

fn and(left: &Field, right: &Field) -> Field {
    match (left.as_bool(), right.as_bool()) {
        (Some(false), _) | (_, Some(false)) => Field::BoolField(false),
        (Some(true), Some(true)) => Field::BoolField(true),
        _ => Field::Null,
    }
}

fn or(left: &Field, right: &Field) -> Field {
    match (left.as_bool(), right.as_bool()) {
        (Some(true), _) | (_, Some(true)) => Field::BoolField(true),
        (Some(false), Some(false)) => Field::BoolField(false),
        _ => Field::Null,
    }
}

fn arithmetic(op: BinaryOp, left: &Field, right: &Field) -> Result<Field, CompilerError> {
    let result = match (left, right) {
        (Field::IntField(l), Field::IntField(r)) => match op {
            BinaryOp::Add => Field::IntField(l.wrapping_add(*r)),
            BinaryOp::Sub => Field::IntField(l.wrapping_sub(*r)),
            BinaryOp::Mul => Field::IntField(l.wrapping_mul(*r)),
            BinaryOp::Div if *r == 0 => Field::Null,
            BinaryOp::Div => Field::IntField(l.wrapping_div(*r)),
            BinaryOp::Mod if *r == 0 => Field::Null,
            BinaryOp::Mod => Field::IntField(l.wrapping_rem(*r)),
            _ => return Err(error(format!("{} is not arithmetic", op))),
        },
        (Field::TimestampField(t), Field::IntField(i)) => match op {
            BinaryOp::Add => Field::TimestampField(t.saturating_add(*i)),
            BinaryOp::Sub => Field::TimestampField(t.saturating_sub(*i)),
            _ => return Err(error(format!("timestamp {} integer", op))),
        },
        (Field::DateField(d), Field::IntField(i)) => match op {
            BinaryOp::Add => Field::DateField(d.wrapping_add(*i as i32)),
            BinaryOp::Sub => Field::DateField(d.wrapping_sub(*i as i32)),
            _ => return Err(error(format!("date {} integer", op))),
        },
        _ => {
            let (l, r) = match (left.as_double(), right.as_double()) {
                (Some(l), Some(r)) => (l, r),
                _ => return Err(error(format!("{} {} {}", left, op, right))),
            };
            match op {
                BinaryOp::Add => Field::double(l + r),
                BinaryOp::Sub => Field::double(l - r),
                BinaryOp::Mul => Field::double(l * r),
                BinaryOp::Div if r == 0.0 => Field::Null,
                BinaryOp::Div => Field::double(l / r),
                BinaryOp::Mod if r == 0.0 => Field::Null,
                BinaryOp::Mod => Field::double(l % r),
                _ => return Err(error(format!("{} is not arithmetic", op))),
            }
        }
    };
    Ok(result)
}

/// Applies a binary operator. NULL operands make the result NULL, except for the connectives.
pub fn binary(op: BinaryOp, left: &Field, right: &Field) -> Result<Field, CompilerError> {
    match op {
        BinaryOp::And => return Ok(and(left, right)),
        BinaryOp::Or => return Ok(or(left, right)),
        _ => (),
    }
    if left.is_null() || right.is_null() {
        return Ok(Field::Null);
    }
    if op.is_comparison() {
        let ordering = compare_fields(left, right)?;
        let result = match op {
            BinaryOp::Eq => ordering == Ordering::Equal,
            BinaryOp::Neq => ordering != Ordering::Equal,
            BinaryOp::Lt => ordering == Ordering::Less,
            BinaryOp::Lte => ordering != Ordering::Greater,
            BinaryOp::Gt => ordering == Ordering::Greater,
            _ => ordering != Ordering::Less,
        };
        return Ok(Field::BoolField(result));
    }
    arithmetic(op, left, right)
}

pub fn unary(op: UnaryOp, operand: &Field) -> Result<Field, CompilerError> {
    let result = match (op, operand) {
        (_, Field::Null) => Field::Null,
        (UnaryOp::Not, Field::BoolField(b)) => Field::BoolField(!b),
        (UnaryOp::Neg, Field::IntField(i)) => Field::IntField(i.wrapping_neg()),
        (UnaryOp::Neg, Field::DoubleField(d)) => Field::double(-d.into_inner()),
        (op, other) => return Err(error(format!("{:?} of {}", op, other))),
    };
    Ok(result)
}

fn truncate(value: i64, kind: ScalarKind) -> i64 {
    match kind {
        ScalarKind::Int16 => i64::from(value as i16),
        ScalarKind::Int32 => i64::from(value as i32),
        _ => value,
    }
}

fn parse(text: &str, dtype: DataType) -> Result<Field, CompilerError> {
    Field::parse(text, dtype).map_err(|e| error(e.to_string()))
}

fn cast_field(field: &Field, kind: ScalarKind) -> Result<Field, CompilerError> {
    let bad = || error(format!("cannot cast {} to {}", field, kind));
    let result = match kind {
        ScalarKind::Bool => match field {
            Field::BoolField(_) => field.clone(),
            Field::IntField(i) => Field::BoolField(*i != 0),
            Field::DoubleField(d) => Field::BoolField(d.into_inner() != 0.0),
            Field::StringField(s) => parse(s.trim(), DataType::Boolean)?,
            _ => return Err(bad()),
        },
        ScalarKind::Int16 | ScalarKind::Int32 | ScalarKind::Int64 => {
            let value = match field {
                Field::IntField(i) => *i,
                Field::BoolField(b) => i64::from(*b),
                Field::DoubleField(d) => d.into_inner() as i64,
                Field::DateField(d) => i64::from(*d),
                Field::TimestampField(t) => *t,
                Field::StringField(s) => parse(s, DataType::BigInt)?.as_int().ok_or_else(bad)?,
                Field::Null => return Err(bad()),
            };
            Field::IntField(truncate(value, kind))
        }
        ScalarKind::Float32 | ScalarKind::Float64 => {
            let value = match field {
                Field::StringField(s) => parse(s, DataType::Double)?.as_double().ok_or_else(bad)?,
                Field::BoolField(b) => f64::from(u8::from(*b)),
                other => other.as_double().ok_or_else(bad)?,
            };
            if kind == ScalarKind::Float32 {
                Field::double(f64::from(value as f32))
            } else {
                Field::double(value)
            }
        }
        ScalarKind::String => match field {
            Field::StringField(_) => field.clone(),
            Field::BoolField(b) => Field::StringField(b.to_string()),
            Field::IntField(i) => Field::StringField(i.to_string()),
            Field::DoubleField(d) => Field::StringField(d.to_string()),
            Field::DateField(d) => Field::StringField(d.to_string()),
            Field::TimestampField(t) => Field::StringField(t.to_string()),
            Field::Null => return Err(bad()),
        },
        ScalarKind::Date => match field {
            Field::DateField(_) => field.clone(),
            Field::IntField(i) => Field::DateField(*i as i32),
            Field::TimestampField(t) => Field::DateField(t.div_euclid(MILLIS_PER_DAY) as i32),
            Field::StringField(s) => parse(s, DataType::Date)?,
            _ => return Err(bad()),
        },
        ScalarKind::Timestamp => match field {
            Field::TimestampField(_) => field.clone(),
            Field::IntField(i) => Field::TimestampField(*i),
            Field::DateField(d) => Field::TimestampField(i64::from(*d) * MILLIS_PER_DAY),
            Field::StringField(s) => parse(s, DataType::Timestamp)?,
            _ => return Err(bad()),
        },
    };
    Ok(result)
}

/// Converts `value` to `ty`. Casting NULL to a non-nullable type fails.
pub fn cast(value: Value, ty: &Type) -> Result<Value, CompilerError> {
    match (ty, value) {
        (Type::Any, v) | (Type::Weight, v) | (Type::Null, v) => Ok(v),
        (Type::Scalar { kind, nullable }, Value::Scalar(field)) => {
            if field.is_null() {
                if *nullable {
                    Ok(Value::null())
                } else {
                    Err(error(format!("NULL cast to {}", ty)))
                }
            } else {
                Ok(Value::Scalar(cast_field(&field, *kind)?))
            }
        }
        (Type::Tuple(types), Value::Tuple(fields)) | (Type::RawTuple(types), Value::Tuple(fields)) => {
            if types.len() != fields.len() {
                return Err(error(format!(
                    "cannot cast a tuple of {} fields to {}",
                    fields.len(),
                    ty
                )));
            }
            let mut result = Vec::with_capacity(fields.len());
            for (field, t) in fields.into_iter().zip(types) {
                result.push(cast(field, t)?);
            }
            Ok(Value::Tuple(result))
        }
        (Type::Vec(element), Value::Vector(elements)) => {
            let mut result = Vec::with_capacity(elements.len());
            for e in elements {
                result.push(cast(e, element)?);
            }
            Ok(Value::Vector(result))
        }
        (ty, v) => Err(error(format!("cannot cast {} to {}", v, ty))),
    }
}

fn one_arg(function: &str, args: &[Value]) -> Result<Field, CompilerError> {
    match args {
        [Value::Scalar(f)] => Ok(f.clone()),
        _ => Err(error(format!("{} expects one scalar argument", function))),
    }
}

fn two_args(function: &str, args: &[Value]) -> Result<(Field, Field), CompilerError> {
    match args {
        [Value::Scalar(a), Value::Scalar(b)] => Ok((a.clone(), b.clone())),
        _ => Err(error(format!("{} expects two scalar arguments", function))),
    }
}

/// Combines an accumulator with a value, skipping NULL values. A NULL accumulator takes the value.
fn accumulate<F>(function: &str, args: &[Value], combine: F) -> Result<Value, CompilerError>
where
    F: Fn(Field, Field) -> Result<Field, CompilerError>,
{
    let (acc, value) = two_args(function, args)?;
    let result = match (acc.is_null(), value.is_null()) {
        (_, true) => acc,
        (true, false) => value,
        (false, false) => combine(acc, value)?,
    };
    Ok(Value::Scalar(result))
}

fn weighted_push(args: Vec<Value>) -> Result<Value, CompilerError> {
    let mut args = args.into_iter();
    match (args.next(), args.next(), args.next()) {
        (Some(Value::Vector(mut elements)), Some(value), Some(Value::Scalar(Field::IntField(w)))) => {
            for _ in 0..w.max(0) {
                elements.push(value.clone());
            }
            Ok(Value::Vector(elements))
        }
        _ => Err(error(String::from(
            "weighted_push expects a vector, a value and a weight",
        ))),
    }
}

/// Calls a runtime library function.
///
/// # Arguments
///
/// * `function` - Name of the function.
/// * `args` - Evaluated arguments.
pub fn apply(function: &str, args: Vec<Value>) -> Result<Value, CompilerError> {
    let boolean = |b: bool| -> Result<Value, CompilerError> { Ok(Value::bool(b)) };
    match function {
        "wrap_bool" => boolean(one_arg(function, &args)? == Field::BoolField(true)),
        "indicator" => Ok(Value::int(if one_arg(function, &args)?.is_null() {
            0
        } else {
            1
        })),
        "is_null" => boolean(one_arg(function, &args)?.is_null()),
        "is_not_null" => boolean(!one_arg(function, &args)?.is_null()),
        "is_true" => boolean(one_arg(function, &args)? == Field::BoolField(true)),
        "is_false" => boolean(one_arg(function, &args)? == Field::BoolField(false)),
        "is_not_true" => boolean(one_arg(function, &args)? != Field::BoolField(true)),
        "is_not_false" => boolean(one_arg(function, &args)? != Field::BoolField(false)),
        "agg_plus" => accumulate(function, &args, |a, v| binary(BinaryOp::Add, &a, &v)),
        "agg_min" => accumulate(function, &args, |a, v| {
            Ok(if compare_fields(&v, &a)? == Ordering::Less {
                v
            } else {
                a
            })
        }),
        "agg_max" => accumulate(function, &args, |a, v| {
            Ok(if compare_fields(&v, &a)? == Ordering::Greater {
                v
            } else {
                a
            })
        }),
        "weighted_push" => weighted_push(args),
        "abs" => {
            let result = match one_arg(function, &args)? {
                Field::IntField(i) => Field::IntField(i.wrapping_abs()),
                Field::DoubleField(d) => Field::double(d.into_inner().abs()),
                Field::Null => Field::Null,
                other => return Err(error(format!("abs of {}", other))),
            };
            Ok(Value::Scalar(result))
        }
        "lower" | "upper" | "char_length" => {
            let result = match one_arg(function, &args)? {
                Field::StringField(s) => match function {
                    "lower" => Field::StringField(s.to_lowercase()),
                    "upper" => Field::StringField(s.to_uppercase()),
                    _ => Field::IntField(s.chars().count() as i64),
                },
                Field::Null => Field::Null,
                other => return Err(error(format!("{} of {}", function, other))),
            };
            Ok(Value::Scalar(result))
        }
        _ => Err(error(format!("unknown function {}", function))),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn int(i: i64) -> Field {
        Field::IntField(i)
    }

    #[test]
    fn test_null_propagation_and_division() {
        assert_eq!(binary(BinaryOp::Add, &int(1), &Field::Null).unwrap(), Field::Null);
        assert_eq!(binary(BinaryOp::Div, &int(10), &int(0)).unwrap(), Field::Null);
        assert_eq!(binary(BinaryOp::Mod, &int(10), &int(3)).unwrap(), int(1));
        assert_eq!(binary(BinaryOp::Lt, &int(1), &Field::double(1.5)).unwrap(), Field::BoolField(true));
        assert_eq!(binary(BinaryOp::Eq, &Field::Null, &int(1)).unwrap(), Field::Null);
    }

    #[test]
    fn test_three_valued_logic() {
        let t = Field::BoolField(true);
        let f = Field::BoolField(false);
        assert_eq!(binary(BinaryOp::And, &Field::Null, &f).unwrap(), f);
        assert_eq!(binary(BinaryOp::And, &Field::Null, &t).unwrap(), Field::Null);
        assert_eq!(binary(BinaryOp::Or, &Field::Null, &t).unwrap(), t);
        assert_eq!(binary(BinaryOp::Or, &f, &f).unwrap(), f);
        assert_eq!(unary(UnaryOp::Not, &Field::Null).unwrap(), Field::Null);
    }

    #[test]
    fn test_casts() {
        let i32_type = Type::scalar(ScalarKind::Int32, false);
        assert_eq!(
            cast(Value::int(i64::from(i32::MAX) + 1), &i32_type).unwrap(),
            Value::int(i64::from(i32::MIN))
        );
        assert!(cast(Value::null(), &i32_type).is_err());
        assert_eq!(cast(Value::null(), &i32_type.with_nullable(true)).unwrap(), Value::null());
        assert_eq!(
            cast(Value::int(3), &Type::f64(false)).unwrap(),
            Value::Scalar(Field::double(3.0))
        );
        let row = Type::Tuple(vec![Type::i64(false), Type::scalar(ScalarKind::String, true)]);
        assert_eq!(
            cast(Value::row(vec![int(1), int(2)]), &row).unwrap(),
            Value::row(vec![int(1), Field::string("2")])
        );
        assert!(cast(Value::row(vec![int(1)]), &row).is_err());
    }

    #[test]
    fn test_aggregate_helpers() {
        let max = apply("agg_max", vec![Value::null(), Value::int(3)]).unwrap();
        assert_eq!(max, Value::int(3));
        let max = apply("agg_max", vec![max, Value::null()]).unwrap();
        assert_eq!(max, Value::int(3));
        let min = apply("agg_min", vec![Value::int(3), Value::int(-1)]).unwrap();
        assert_eq!(min, Value::int(-1));
        let sum = apply("agg_plus", vec![Value::int(3), Value::int(4)]).unwrap();
        assert_eq!(sum, Value::int(7));
        assert_eq!(apply("indicator", vec![Value::null()]).unwrap(), Value::int(0));
        assert_eq!(apply("wrap_bool", vec![Value::null()]).unwrap(), Value::bool(false));
        assert!(apply("soundex", vec![]).is_err());
    }

    #[test]
    fn test_weighted_push() {
        let v = apply(
            "weighted_push",
            vec![Value::Vector(vec![]), Value::int(1), Value::int(2)],
        )
        .unwrap();
        assert_eq!(v, Value::Vector(vec![Value::int(1), Value::int(1)]));
        let v = apply("weighted_push", vec![v, Value::int(2), Value::int(-1)]).unwrap();
        assert_eq!(v.into_vector().unwrap().len(), 2);
    }

    #[test]
    fn test_string_functions() {
        let s = Value::Scalar(Field::string("Abc"));
        assert_eq!(apply("upper", vec![s.clone()]).unwrap(), Value::Scalar(Field::string("ABC")));
        assert_eq!(apply("char_length", vec![s]).unwrap(), Value::int(3));
        assert_eq!(apply("abs", vec![Value::int(-4)]).unwrap(), Value::int(4));
    }
}

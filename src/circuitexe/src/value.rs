use common::{CompilerError, Field};
use std::fmt;

/// Runtime values. Tuples and raw tuples share one representation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Scalar(Field),
    Tuple(Vec<Value>),
    Vector(Vec<Value>),
}

impl Value {
    pub fn null() -> Self {
        Value::Scalar(Field::Null)
    }

    pub fn int(value: i64) -> Self {
        Value::Scalar(Field::IntField(value))
    }

    pub fn bool(value: bool) -> Self {
        Value::Scalar(Field::BoolField(value))
    }

    /// A tuple of scalars.
    pub fn row(fields: Vec<Field>) -> Self {
        Value::Tuple(fields.into_iter().map(Value::Scalar).collect())
    }

    pub fn as_field(&self) -> Result<&Field, CompilerError> {
        match self {
            Value::Scalar(f) => Ok(f),
            other => Err(CompilerError::ExecutionError(format!(
                "expected a scalar, got {}",
                other
            ))),
        }
    }

    pub fn into_field(self) -> Result<Field, CompilerError> {
        match self {
            Value::Scalar(f) => Ok(f),
            other => Err(CompilerError::ExecutionError(format!(
                "expected a scalar, got {}",
                other
            ))),
        }
    }

    /// Field `index` of a tuple.
    pub fn field(&self, index: usize) -> Result<&Value, CompilerError> {
        match self {
            Value::Tuple(fields) => fields.get(index).ok_or_else(|| {
                CompilerError::ExecutionError(format!("no field {} in {}", index, self))
            }),
            other => Err(CompilerError::ExecutionError(format!(
                "field {} of non-tuple {}",
                index, other
            ))),
        }
    }

    pub fn field_mut(&mut self, index: usize) -> Result<&mut Value, CompilerError> {
        let description = self.to_string();
        match self {
            Value::Tuple(fields) => fields.get_mut(index).ok_or_else(|| {
                CompilerError::ExecutionError(format!("no field {} in {}", index, description))
            }),
            _ => Err(CompilerError::ExecutionError(format!(
                "field {} of non-tuple {}",
                index, description
            ))),
        }
    }

    /// Splits a `(key, value)` pair of an indexed Z-set.
    pub fn split_pair(&self) -> Result<(&Value, &Value), CompilerError> {
        match self {
            Value::Tuple(fields) if fields.len() == 2 => Ok((&fields[0], &fields[1])),
            other => Err(CompilerError::ExecutionError(format!(
                "expected a (key, value) pair, got {}",
                other
            ))),
        }
    }

    pub fn pair(key: Value, value: Value) -> Self {
        Value::Tuple(vec![key, value])
    }

    pub fn into_vector(self) -> Result<Vec<Value>, CompilerError> {
        match self {
            Value::Vector(v) => Ok(v),
            other => Err(CompilerError::ExecutionError(format!(
                "expected a vector, got {}",
                other
            ))),
        }
    }
}

fn join(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(field) => write!(f, "{}", field),
            Value::Tuple(fields) => write!(f, "({})", join(fields)),
            Value::Vector(elements) => write!(f, "[{}]", join(elements)),
        }
    }
}

impl From<Field> for Value {
    fn from(field: Field) -> Self {
        Value::Scalar(field)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display_and_order() {
        let a = Value::row(vec![Field::IntField(1), Field::Null]);
        let b = Value::row(vec![Field::IntField(1), Field::string("x")]);
        assert_eq!(a.to_string(), "(1, NULL)");
        assert!(a < b);
        assert_eq!(Value::Vector(vec![Value::int(2)]).to_string(), "[2]");
    }

    #[test]
    fn test_field_access() {
        let mut t = Value::pair(Value::int(1), Value::bool(true));
        assert_eq!(t.field(1).unwrap(), &Value::bool(true));
        *t.field_mut(0).unwrap() = Value::int(5);
        let (k, _) = t.split_pair().unwrap();
        assert_eq!(k, &Value::int(5));
        assert!(t.field(2).is_err());
        assert!(Value::int(1).field(0).is_err());
    }
}

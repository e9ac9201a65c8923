use common::{DataType, SqlType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar types of the circuit runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Bool,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Date,
    Timestamp,
}

impl ScalarKind {
    pub fn is_integer(self) -> bool {
        match self {
            ScalarKind::Int16 | ScalarKind::Int32 | ScalarKind::Int64 => true,
            _ => false,
        }
    }

    pub fn is_numeric(self) -> bool {
        match self {
            ScalarKind::Float32 | ScalarKind::Float64 => true,
            k => k.is_integer(),
        }
    }

    /// The SQL dtype this kind represents.
    pub fn to_sql(self) -> DataType {
        match self {
            ScalarKind::Bool => DataType::Boolean,
            ScalarKind::Int16 => DataType::SmallInt,
            ScalarKind::Int32 => DataType::Int,
            ScalarKind::Int64 => DataType::BigInt,
            ScalarKind::Float32 => DataType::Real,
            ScalarKind::Float64 => DataType::Double,
            ScalarKind::String => DataType::Varchar,
            ScalarKind::Date => DataType::Date,
            ScalarKind::Timestamp => DataType::Timestamp,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int16 => "i16",
            ScalarKind::Int32 => "i32",
            ScalarKind::Int64 => "i64",
            ScalarKind::Float32 => "F32",
            ScalarKind::Float64 => "F64",
            ScalarKind::String => "String",
            ScalarKind::Date => "Date",
            ScalarKind::Timestamp => "Timestamp",
        };
        write!(f, "{}", s)
    }
}

/// Types of circuit values and streams.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Scalar { kind: ScalarKind, nullable: bool },
    /// Type of an untyped NULL.
    Null,
    /// A row.
    Tuple(Vec<Type>),
    /// An anonymous grouping, used for keys, accumulators and (key, value) pairs.
    RawTuple(Vec<Type>),
    Vec(Box<Type>),
    ZSet(Box<Type>),
    IndexedZSet(Box<Type>, Box<Type>),
    /// Z-set weights.
    Weight,
    /// Functions, folds and other values without a precise type.
    Any,
}

impl Type {
    pub fn scalar(kind: ScalarKind, nullable: bool) -> Self {
        Type::Scalar { kind, nullable }
    }

    pub fn bool(nullable: bool) -> Self {
        Type::scalar(ScalarKind::Bool, nullable)
    }

    pub fn i64(nullable: bool) -> Self {
        Type::scalar(ScalarKind::Int64, nullable)
    }

    pub fn f64(nullable: bool) -> Self {
        Type::scalar(ScalarKind::Float64, nullable)
    }

    pub fn unit() -> Self {
        Type::RawTuple(Vec::new())
    }

    pub fn zset(element: Type) -> Self {
        Type::ZSet(Box::new(element))
    }

    pub fn indexed_zset(key: Type, value: Type) -> Self {
        Type::IndexedZSet(Box::new(key), Box::new(value))
    }

    /// Converts a SQL type.
    pub fn from_sql(ty: SqlType) -> Self {
        let kind = match ty.dtype {
            DataType::Boolean => ScalarKind::Bool,
            DataType::SmallInt => ScalarKind::Int16,
            DataType::Int => ScalarKind::Int32,
            DataType::BigInt => ScalarKind::Int64,
            DataType::Real => ScalarKind::Float32,
            DataType::Double => ScalarKind::Float64,
            DataType::Varchar => ScalarKind::String,
            DataType::Date => ScalarKind::Date,
            DataType::Timestamp => ScalarKind::Timestamp,
            DataType::Null => return Type::Null,
        };
        Type::scalar(kind, ty.nullable)
    }

    /// Converts back to a SQL type, for scalar types.
    pub fn to_sql(&self) -> Option<SqlType> {
        match self {
            Type::Scalar { kind, nullable } => Some(SqlType::new(kind.to_sql(), *nullable)),
            Type::Null => Some(SqlType::nullable(DataType::Null)),
            _ => None,
        }
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            Type::Scalar { nullable, .. } => *nullable,
            Type::Null => true,
            _ => false,
        }
    }

    /// Same type with the given nullability. Only scalars are affected.
    pub fn with_nullable(&self, nullable: bool) -> Self {
        match self {
            Type::Scalar { kind, .. } => Type::scalar(*kind, nullable),
            other => other.clone(),
        }
    }

    pub fn kind(&self) -> Option<ScalarKind> {
        match self {
            Type::Scalar { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        self.kind().map_or(false, ScalarKind::is_integer)
    }

    pub fn is_numeric(&self) -> bool {
        self.kind().map_or(false, ScalarKind::is_numeric)
    }

    /// Fields of a tuple or raw tuple.
    pub fn fields(&self) -> Option<&[Type]> {
        match self {
            Type::Tuple(fields) | Type::RawTuple(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn field(&self, index: usize) -> Option<&Type> {
        self.fields().and_then(|f| f.get(index))
    }

    /// Element type of a Z-set stream.
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::ZSet(e) => Some(e),
            _ => None,
        }
    }

    /// Key and value types of an indexed Z-set stream.
    pub fn key_value(&self) -> Option<(&Type, &Type)> {
        match self {
            Type::IndexedZSet(k, v) => Some((k, v)),
            _ => None,
        }
    }
}

fn join_types(types: &[Type]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Scalar { kind, nullable } => {
                if *nullable {
                    write!(f, "Option<{}>", kind)
                } else {
                    write!(f, "{}", kind)
                }
            }
            Type::Null => write!(f, "Null"),
            Type::Tuple(fields) => write!(f, "Tuple{}<{}>", fields.len(), join_types(fields)),
            Type::RawTuple(fields) => write!(f, "({})", join_types(fields)),
            Type::Vec(e) => write!(f, "Vec<{}>", e),
            Type::ZSet(e) => write!(f, "OrdZSet<{}, Weight>", e),
            Type::IndexedZSet(k, v) => write!(f, "OrdIndexedZSet<{}, {}, Weight>", k, v),
            Type::Weight => write!(f, "Weight"),
            Type::Any => write!(f, "_"),
        }
    }
}

extern crate csv;
#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

use ordered_float::OrderedFloat;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use sqlparser::ast;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::io;
pub mod catalog;
pub mod csv_utils;
pub mod database;
pub mod logical_plan;
pub mod plan_graph;
pub mod table;
pub mod testutil;

pub use logical_plan::{AggFunction, SqlOperator};

/// Custom error type.
#[derive(Debug, Clone, PartialEq)]
pub enum CompilerError {
    /// IO Errors.
    IOError(String),
    /// A construct with no lowering rule.
    Unimplemented(String),
    /// Internal inconsistency detected while building a circuit.
    TranslationError(String),
    /// Schema and lookup errors.
    ValidationError(String),
    /// Malformed DDL or plan input.
    ParseError(String),
    /// Errors raised while evaluating a circuit.
    ExecutionError(String),
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                CompilerError::Unimplemented(s) => format!("Not yet implemented: {}", s),
                CompilerError::TranslationError(s) => format!("Translation Error: {}", s),
                CompilerError::ValidationError(s) => format!("Validation Error: {}", s),
                CompilerError::ParseError(s) => format!("Parse Error: {}", s),
                CompilerError::ExecutionError(s) => format!("Execution Error: {}", s),
                CompilerError::IOError(s) => s.to_string(),
            }
        )
    }
}

// Implement std::convert::From for AppError; from io::Error
impl From<io::Error> for CompilerError {
    fn from(error: io::Error) -> Self {
        CompilerError::IOError(error.to_string())
    }
}

impl From<serde_json::Error> for CompilerError {
    fn from(error: serde_json::Error) -> Self {
        CompilerError::ParseError(error.to_string())
    }
}

impl Error for CompilerError {}

/// Handle schemas.
#[derive(PartialEq, Clone, Debug)]
pub struct TableSchema {
    /// Attributes of the schema.
    attributes: Vec<Attribute>,
    /// Mapping from attribute name to order in the schema.
    name_map: HashMap<String, usize>,
}

impl Serialize for TableSchema {
    /// Custom serialize to avoid serializing name_map.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.attributes.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TableSchema {
    /// Custom deserialize to avoid serializing name_map.
    fn deserialize<D>(deserializer: D) -> Result<TableSchema, D::Error>
    where
        D: Deserializer<'de>,
    {
        let attrs = Vec::deserialize(deserializer)?;
        Ok(TableSchema::new(attrs))
    }
}

impl TableSchema {
    /// Create a new schema.
    ///
    /// When two attributes share a name the first one wins the name lookup.
    ///
    /// # Arguments
    ///
    /// * `attributes` - Attributes of the schema in the order that they are in the schema.
    pub fn new(attributes: Vec<Attribute>) -> Self {
        let mut name_map = HashMap::new();
        for (i, attr) in attributes.iter().enumerate() {
            name_map.entry(attr.name().to_string()).or_insert(i);
        }
        Self {
            attributes,
            name_map,
        }
    }

    /// Create a new schema with the given names and types.
    ///
    /// # Arguments
    ///
    /// * `names` - Names of the new schema.
    /// * `types` - Types of the new schema.
    pub fn from_vecs(names: Vec<&str>, types: Vec<SqlType>) -> Self {
        let mut attrs = Vec::new();
        for (name, ty) in names.iter().zip(types.iter()) {
            attrs.push(Attribute::new(name.to_string(), ty.dtype, ty.nullable));
        }
        TableSchema::new(attrs)
    }

    /// Get the attribute from the given index.
    ///
    /// # Arguments
    ///
    /// * `i` - Index of the attribute to look for.
    pub fn get_attribute(&self, i: usize) -> Option<&Attribute> {
        self.attributes.get(i)
    }

    /// Get the index of the attribute.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the attribute to get the index for.
    pub fn get_field_index(&self, name: &str) -> Option<&usize> {
        self.name_map.get(name)
    }

    /// Check if the attribute name is in the schema.
    pub fn contains(&self, name: &str) -> bool {
        self.name_map.contains_key(name)
    }

    /// Get an iterator of the attributes.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    /// Types of the columns, in order.
    pub fn types(&self) -> Vec<SqlType> {
        self.attributes.iter().map(Attribute::sql_type).collect()
    }

    /// Merge two schemas into one.
    ///
    /// The other schema is appended to the current schema.
    ///
    /// # Arguments
    ///
    /// * `other` - Other schema to add to current schema.
    pub fn merge(&self, other: &Self) -> Self {
        let mut attrs = self.attributes.clone();
        attrs.append(&mut other.attributes.clone());
        Self::new(attrs)
    }

    /// Returns the schema restricted to the columns in `range`.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        Self::new(self.attributes[start..end].to_vec())
    }

    /// Returns the length of the schema.
    pub fn size(&self) -> usize {
        self.attributes.len()
    }
}

/// Handle attributes. Pairs the name with the type.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Attribute dtype.
    pub dtype: DataType,
    /// Whether the column admits NULL.
    #[serde(default)]
    pub nullable: bool,
}

impl Attribute {
    /// Create a new attribute with the given name and type.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the attribute.
    /// * `dtype` - Dtype of the attribute.
    /// * `nullable` - Whether NULL is a legal value.
    pub fn new(name: String, dtype: DataType, nullable: bool) -> Self {
        Self {
            name,
            dtype,
            nullable,
        }
    }

    /// Returns the name of the attribute.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the dtype of the attribute.
    pub fn dtype(&self) -> &DataType {
        &self.dtype
    }

    pub fn sql_type(&self) -> SqlType {
        SqlType::new(self.dtype, self.nullable)
    }
}

/// Enumerate the supported SQL dtypes.
#[derive(PartialEq, Eq, Serialize, Deserialize, Clone, Copy, Debug, Hash)]
pub enum DataType {
    Boolean,
    SmallInt,
    Int,
    BigInt,
    Real,
    Double,
    Varchar,
    Date,
    Timestamp,
    /// Type of an untyped NULL literal.
    Null,
}

impl DataType {
    pub fn is_numeric(self) -> bool {
        self.numeric_rank().is_some()
    }

    pub fn is_integer(self) -> bool {
        match self {
            DataType::SmallInt | DataType::Int | DataType::BigInt => true,
            _ => false,
        }
    }

    /// Position in the numeric widening order.
    fn numeric_rank(self) -> Option<u8> {
        match self {
            DataType::SmallInt => Some(0),
            DataType::Int => Some(1),
            DataType::BigInt => Some(2),
            DataType::Real => Some(3),
            DataType::Double => Some(4),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Boolean => "BOOLEAN",
            DataType::SmallInt => "SMALLINT",
            DataType::Int => "INTEGER",
            DataType::BigInt => "BIGINT",
            DataType::Real => "REAL",
            DataType::Double => "DOUBLE",
            DataType::Varchar => "VARCHAR",
            DataType::Date => "DATE",
            DataType::Timestamp => "TIMESTAMP",
            DataType::Null => "NULL",
        };
        write!(f, "{}", name)
    }
}

/// A SQL type: a dtype plus nullability.
#[derive(PartialEq, Eq, Serialize, Deserialize, Clone, Copy, Debug, Hash)]
pub struct SqlType {
    pub dtype: DataType,
    pub nullable: bool,
}

impl SqlType {
    pub fn new(dtype: DataType, nullable: bool) -> Self {
        Self { dtype, nullable }
    }

    pub fn not_null(dtype: DataType) -> Self {
        Self::new(dtype, false)
    }

    pub fn nullable(dtype: DataType) -> Self {
        Self::new(dtype, true)
    }

    pub fn with_nullable(self, nullable: bool) -> Self {
        Self::new(self.dtype, nullable)
    }

    /// The type both operands of a binary operation are converted to.
    ///
    /// Numeric types widen; NULL adopts the other side; the result is nullable when either side is.
    pub fn common(self, other: SqlType) -> Result<SqlType, CompilerError> {
        let nullable = self.nullable || other.nullable;
        let dtype = if self.dtype == other.dtype {
            self.dtype
        } else if self.dtype == DataType::Null {
            other.dtype
        } else if other.dtype == DataType::Null {
            self.dtype
        } else {
            match (self.dtype.numeric_rank(), other.dtype.numeric_rank()) {
                (Some(a), Some(b)) => {
                    if a >= b {
                        self.dtype
                    } else {
                        other.dtype
                    }
                }
                _ => {
                    return Err(CompilerError::Unimplemented(format!(
                        "no common type for {} and {}",
                        self, other
                    )))
                }
            }
        };
        Ok(SqlType::new(dtype, nullable || dtype == DataType::Null))
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "{}", self.dtype)
        } else {
            write!(f, "{} NOT NULL", self.dtype)
        }
    }
}

/// Scalar values. Used both for literals inside plans and for row contents.
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, PartialOrd, Ord, Clone, Hash)]
pub enum Field {
    Null,
    BoolField(bool),
    IntField(i64),
    DoubleField(OrderedFloat<f64>),
    StringField(String),
    /// Days since the epoch.
    DateField(i32),
    /// Milliseconds since the epoch.
    TimestampField(i64),
}

impl Field {
    pub fn double(value: f64) -> Self {
        Field::DoubleField(OrderedFloat(value))
    }

    pub fn string(value: &str) -> Self {
        Field::StringField(value.to_string())
    }

    pub fn is_null(&self) -> bool {
        *self == Field::Null
    }

    /// Returns the integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Field::IntField(i) => Some(*i),
            Field::DateField(d) => Some(i64::from(*d)),
            Field::TimestampField(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Field::BoolField(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Field::DoubleField(d) => Some(d.into_inner()),
            Field::IntField(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Parses a textual value according to `dtype`. Empty text is NULL.
    ///
    /// # Arguments
    ///
    /// * `text` - Text to parse.
    /// * `dtype` - Expected dtype.
    pub fn parse(text: &str, dtype: DataType) -> Result<Field, CompilerError> {
        if text.is_empty() || text.eq_ignore_ascii_case("null") {
            return Ok(Field::Null);
        }
        let bad = || CompilerError::ParseError(format!("cannot parse '{}' as {}", text, dtype));
        let field = match dtype {
            DataType::Boolean => match text.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Field::BoolField(true),
                "false" | "f" | "0" => Field::BoolField(false),
                _ => return Err(bad()),
            },
            DataType::SmallInt | DataType::Int | DataType::BigInt => {
                Field::IntField(text.trim().parse::<i64>().map_err(|_| bad())?)
            }
            DataType::Real | DataType::Double => {
                Field::double(text.trim().parse::<f64>().map_err(|_| bad())?)
            }
            DataType::Varchar => Field::StringField(text.to_string()),
            DataType::Date => Field::DateField(text.trim().parse::<i32>().map_err(|_| bad())?),
            DataType::Timestamp => {
                Field::TimestampField(text.trim().parse::<i64>().map_err(|_| bad())?)
            }
            DataType::Null => return Err(bad()),
        };
        Ok(field)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Null => write!(f, "NULL"),
            Field::BoolField(x) => write!(f, "{}", x),
            Field::IntField(x) => write!(f, "{}", x),
            Field::DoubleField(x) => write!(f, "{}", x),
            Field::StringField(x) => write!(f, "{:?}", x),
            Field::DateField(x) => write!(f, "date({})", x),
            Field::TimestampField(x) => write!(f, "timestamp({})", x),
        }
    }
}

/// Retrieve the name from the command parser object.
///
/// # Argument
///
/// * `name` - Name object from the command parser.
pub fn get_name(name: &ast::ObjectName) -> Result<String, CompilerError> {
    if name.0.len() != 1 {
        Err(CompilerError::ValidationError(format!(
            "qualified names are not supported: {}",
            name
        )))
    } else {
        Ok(name.0[0].clone())
    }
}

/// Retrieve the dtype from the command parser object.
///
/// # Argument
///
/// * `dtype` - Name object from the command parser.
pub fn get_attr(dtype: &ast::DataType) -> Result<DataType, CompilerError> {
    match dtype {
        ast::DataType::Boolean => Ok(DataType::Boolean),
        ast::DataType::SmallInt => Ok(DataType::SmallInt),
        ast::DataType::Int => Ok(DataType::Int),
        ast::DataType::BigInt => Ok(DataType::BigInt),
        ast::DataType::Real => Ok(DataType::Real),
        ast::DataType::Double | ast::DataType::Float(_) => Ok(DataType::Double),
        ast::DataType::Varchar(_) | ast::DataType::Char(_) | ast::DataType::Text => {
            Ok(DataType::Varchar)
        }
        ast::DataType::Date => Ok(DataType::Date),
        ast::DataType::Timestamp => Ok(DataType::Timestamp),
        _ => Err(CompilerError::Unimplemented(format!(
            "unsupported column type {}",
            dtype
        ))),
    }
}

/// Builds an attribute from a column definition. `NOT NULL` and `PRIMARY KEY` make it non-nullable.
pub fn get_column(col: &ast::ColumnDef) -> Result<Attribute, CompilerError> {
    let dtype = get_attr(&col.data_type)?;
    let not_null = col.options.iter().any(|o| match o.option {
        ast::ColumnOption::NotNull => true,
        ast::ColumnOption::Unique { is_primary } => is_primary,
        _ => false,
    });
    Ok(Attribute::new(col.name.clone(), dtype, !not_null))
}

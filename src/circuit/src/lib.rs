//! Circuit intermediate representation: typed operators over Z-set streams, the closures that
//! drive them, and the circuit that owns both.
#[macro_use]
extern crate log;

pub mod circuit;
pub mod expr;
pub mod operator;
pub mod types;

pub use crate::circuit::{Circuit, Declaration};
pub use crate::expr::{BinaryOp, Expr, Param, Statement, UnaryOp};
pub use crate::operator::{Arity, Operator, OperatorId, OperatorKind};
pub use crate::types::{ScalarKind, Type};

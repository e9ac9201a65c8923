use circuit::{BinaryOp, Circuit, Expr, ScalarKind, Statement, Type};
use common::logical_plan::AggregateCall;
use common::{AggFunction, CompilerError, Field};

/// The fold implementing one aggregate call.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateImplementation {
    /// Initial accumulator.
    pub zero: Expr,
    /// Closure `|a, v, w|` returning the next accumulator.
    pub increment: Expr,
    /// Closure `|a|` turning the accumulator into the result, when it is not the result already.
    pub postprocess: Option<Expr>,
    /// Value of the aggregate over an empty input.
    pub empty_set_result: Expr,
}

impl AggregateImplementation {
    pub fn accumulator_type(&self) -> Type {
        self.zero.ty()
    }
}

/// Builds the fold of a single aggregate call over rows bound to `row`.
pub struct AggregateCompiler<'a> {
    call: &'a AggregateCall,
    result_type: Type,
    row: &'a Expr,
    weight: Expr,
}

fn zero_of(ty: &Type) -> Expr {
    match ty.kind() {
        Some(ScalarKind::Float32) | Some(ScalarKind::Float64) => {
            Expr::literal(Field::double(0.0), ty.clone())
        }
        _ => Expr::int(0, ty.clone()),
    }
}

impl<'a> AggregateCompiler<'a> {
    /// # Arguments
    ///
    /// * `call` - Aggregate call to implement.
    /// * `result_type` - Declared type of the aggregate column.
    /// * `row` - Variable bound to the input row.
    pub fn new(call: &'a AggregateCall, result_type: &Type, row: &'a Expr) -> Self {
        Self {
            call,
            result_type: result_type.clone(),
            row,
            weight: Expr::var("w", Type::Weight),
        }
    }

    fn argument(&self) -> Result<Option<Expr>, CompilerError> {
        match self.call.args.as_slice() {
            [] => Ok(None),
            [index] => {
                let width = self.row.ty().fields().map_or(0, |f| f.len());
                if *index >= width {
                    return Err(CompilerError::TranslationError(format!(
                        "{} reads column {} of a {}-column row",
                        self.call, index, width
                    )));
                }
                Ok(Some(self.row.field(*index)))
            }
            _ => Err(CompilerError::Unimplemented(format!(
                "aggregate with {} arguments: {}",
                self.call.args.len(),
                self.call
            ))),
        }
    }

    fn required_argument(&self) -> Result<Expr, CompilerError> {
        self.argument()?.ok_or_else(|| {
            CompilerError::TranslationError(format!("{} without an argument", self.call))
        })
    }

    /// `value * w` unless the call is DISTINCT.
    fn weighted(&self, value: Expr) -> Expr {
        if self.call.distinct {
            return value;
        }
        let ty = value.ty();
        let weight = self.weight.clone().cast(&ty.with_nullable(false));
        Expr::binary(BinaryOp::Mul, value, weight, ty)
    }

    /// 1, or 0 for a NULL argument.
    fn counter(&self, argument: Option<Expr>, ty: &Type) -> Expr {
        match argument {
            Some(arg) if arg.ty().is_nullable() => Expr::apply("indicator", vec![arg], ty.clone()),
            _ => Expr::int(1, ty.clone()),
        }
    }

    fn closure(&self, accumulator: &Expr, body: Expr) -> Expr {
        body.closure(vec![
            accumulator.as_param(),
            self.row.as_param(),
            self.weight.as_param(),
        ])
    }

    fn count(&self) -> Result<AggregateImplementation, CompilerError> {
        let ty = self.result_type.with_nullable(false);
        let zero = zero_of(&ty);
        let a = Expr::var("a", ty.clone());
        let one = self.counter(self.argument()?, &ty);
        let body = Expr::binary(BinaryOp::Add, a.clone(), self.weighted(one), ty);
        Ok(AggregateImplementation {
            zero: zero.clone(),
            increment: self.closure(&a, body),
            postprocess: None,
            empty_set_result: zero,
        })
    }

    fn extremum(&self, function: &str) -> Result<AggregateImplementation, CompilerError> {
        let ty = self.result_type.with_nullable(true);
        let zero = Expr::null(&ty);
        let a = Expr::var("a", ty.clone());
        let arg = self.required_argument()?;
        let arg = arg.clone().cast(&ty.with_nullable(arg.ty().is_nullable()));
        let body = Expr::apply(function, vec![a.clone(), arg], ty);
        Ok(AggregateImplementation {
            zero: zero.clone(),
            increment: self.closure(&a, body),
            postprocess: None,
            empty_set_result: zero,
        })
    }

    fn sum(&self, empty_is_zero: bool) -> Result<AggregateImplementation, CompilerError> {
        let ty = self.result_type.with_nullable(!empty_is_zero);
        let zero = if empty_is_zero {
            zero_of(&ty)
        } else {
            Expr::null(&ty)
        };
        let a = Expr::var("a", ty.clone());
        let arg = self.required_argument()?;
        let arg = arg.clone().cast(&ty.with_nullable(arg.ty().is_nullable()));
        let body = Expr::apply("agg_plus", vec![a.clone(), self.weighted(arg)], ty);
        Ok(AggregateImplementation {
            zero: zero.clone(),
            increment: self.closure(&a, body),
            postprocess: None,
            empty_set_result: zero,
        })
    }

    fn average(&self) -> Result<AggregateImplementation, CompilerError> {
        let arg = self.required_argument()?;
        let arg_type = arg.ty();
        let sum_type = match arg_type.kind() {
            Some(ScalarKind::Float32) | Some(ScalarKind::Float64) => Type::f64(true),
            _ => Type::i64(true),
        };
        let count_type = Type::i64(true);
        let acc_type = Type::RawTuple(vec![sum_type.clone(), count_type.clone()]);
        let zero = Expr::RawTuple(vec![Expr::null(&sum_type), Expr::null(&count_type)]);
        let a = Expr::var("a", acc_type);
        let value = arg
            .clone()
            .cast(&sum_type.with_nullable(arg_type.is_nullable()));
        let sum = Expr::apply(
            "agg_plus",
            vec![a.field(0), self.weighted(value)],
            sum_type.clone(),
        );
        let counter = self.counter(Some(arg), &count_type.with_nullable(false));
        let count = Expr::apply(
            "agg_plus",
            vec![a.field(1), self.weighted(counter)],
            count_type,
        );
        let body = Expr::RawTuple(vec![sum, count]);

        let result_type = self.result_type.with_nullable(true);
        let p = Expr::var("a", a.ty());
        let divide = Expr::binary(
            BinaryOp::Div,
            p.field(0),
            p.field(1).cast(&sum_type),
            sum_type,
        );
        let post = divide.cast(&result_type).closure(vec![p.as_param()]);
        Ok(AggregateImplementation {
            zero,
            increment: self.closure(&a, body),
            postprocess: Some(post),
            empty_set_result: Expr::null(&result_type),
        })
    }

    pub fn compile(&self) -> Result<AggregateImplementation, CompilerError> {
        trace!("Compiling aggregate {}", self.call);
        match self.call.function {
            AggFunction::Count => self.count(),
            AggFunction::Min => self.extremum("agg_min"),
            AggFunction::Max => self.extremum("agg_max"),
            AggFunction::Sum => self.sum(false),
            AggFunction::Sum0 => self.sum(true),
            AggFunction::Avg => self.average(),
        }
    }
}

/// A fold computing several aggregates at once.
#[derive(Debug, Clone)]
pub struct FoldDescription {
    /// Reference to the declared fold.
    pub fold: Expr,
    /// One field per call: the result of the call over an empty input.
    pub default_zero: Expr,
    pub accumulator_type: Type,
    /// Tuple of the values produced by the fold's post-processing.
    pub result_type: Type,
}

/// Combines the folds of `calls` into a single fold over rows of `row_type` and declares its parts
/// in `circuit`.
///
/// # Arguments
///
/// * `circuit` - Circuit receiving the declarations.
/// * `calls` - Aggregate calls, in output order.
/// * `result_types` - Declared type of each call.
/// * `row_type` - Type of the folded rows.
pub fn create_folding_function(
    circuit: &mut Circuit,
    calls: &[AggregateCall],
    result_types: &[Type],
    row_type: &Type,
) -> Result<FoldDescription, CompilerError> {
    if calls.len() != result_types.len() {
        return Err(CompilerError::TranslationError(format!(
            "{} aggregates but {} result columns",
            calls.len(),
            result_types.len()
        )));
    }
    let v = Expr::var("v", row_type.clone());
    let w = Expr::var("w", Type::Weight);
    let mut zeros = Vec::with_capacity(calls.len());
    let mut increments = Vec::with_capacity(calls.len());
    let mut posts = Vec::with_capacity(calls.len());
    let mut defaults = Vec::with_capacity(calls.len());
    let mut acc_types = Vec::with_capacity(calls.len());
    for (call, ty) in calls.iter().zip(result_types) {
        let implementation = AggregateCompiler::new(call, ty, &v).compile()?;
        let acc_type = implementation.accumulator_type();
        zeros.push(implementation.zero.clone());
        increments.push(circuit.declare_local("inc", implementation.increment));
        posts.push(match implementation.postprocess {
            Some(post) => {
                let post_type = match &post {
                    Expr::Closure { body, .. } => body.ty(),
                    other => other.ty(),
                };
                Some((circuit.declare_local("post", post), post_type))
            }
            None => None,
        });
        defaults.push(implementation.empty_set_result);
        acc_types.push(acc_type);
    }

    let accumulator_type = Type::RawTuple(acc_types.clone());
    let zero = circuit.declare_local("zero", Expr::RawTuple(zeros));

    let a = Expr::var("a", accumulator_type.clone());
    let statements = increments
        .into_iter()
        .enumerate()
        .map(|(i, inc)| Statement::FieldAssign {
            var: String::from("a"),
            index: i,
            value: Expr::call(inc, vec![a.field(i), v.clone(), w.clone()], acc_types[i].clone()),
        })
        .collect();
    let body = Expr::Block {
        statements,
        result: Box::new(a.clone()),
    };
    let increment = circuit.declare_local(
        "increment",
        body.closure(vec![a.as_param(), v.as_param(), w.as_param()]),
    );

    let mut result_fields = Vec::with_capacity(posts.len());
    for (i, post) in posts.into_iter().enumerate() {
        result_fields.push(match post {
            Some((post, ty)) => Expr::call(post, vec![a.field(i)], ty),
            None => a.field(i),
        });
    }
    let result = Expr::Tuple(result_fields);
    let result_type = result.ty();
    let post = circuit.declare_local("post", result.closure(vec![a.as_param()]));

    let fold = Expr::Fold {
        zero: Box::new(zero),
        increment: Box::new(increment),
        postprocess: Some(Box::new(post)),
    };
    Ok(FoldDescription {
        fold: circuit.declare_local("folder", fold),
        default_zero: Expr::Tuple(defaults),
        accumulator_type,
        result_type,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use common::testutil::*;
    use common::{DataType, SqlType};

    fn row() -> Expr {
        Expr::var(
            "v",
            Type::Tuple(vec![Type::from_sql(int()), Type::from_sql(nullable_int())]),
        )
    }

    #[test]
    fn test_count_star() {
        let call = AggregateCall::new(AggFunction::Count, vec![], SqlType::not_null(DataType::BigInt));
        let v = row();
        let imp = AggregateCompiler::new(&call, &Type::i64(false), &v)
            .compile()
            .unwrap();
        assert_eq!(imp.zero, Expr::int(0, Type::i64(false)));
        assert_eq!(imp.empty_set_result, imp.zero);
        assert!(imp.postprocess.is_none());
        assert!(imp.increment.to_string().contains("(a + (1 * cast::<i64>(w)))"));
    }

    #[test]
    fn test_count_nullable_uses_indicator() {
        let call = AggregateCall::new(AggFunction::Count, vec![1], SqlType::not_null(DataType::BigInt));
        let v = row();
        let imp = AggregateCompiler::new(&call, &Type::i64(false), &v)
            .compile()
            .unwrap();
        assert!(imp.increment.to_string().contains("indicator(v.1)"));
    }

    #[test]
    fn test_distinct_sum_ignores_weight() {
        let call = AggregateCall::new(AggFunction::Sum, vec![0], nullable_int()).distinct();
        let v = row();
        let imp = AggregateCompiler::new(&call, &Type::from_sql(nullable_int()), &v)
            .compile()
            .unwrap();
        match imp.increment {
            Expr::Closure { body, .. } => match *body {
                Expr::Apply { function, args, .. } => {
                    assert_eq!(function, "agg_plus");
                    assert_eq!(args[1], v.field(0).cast(&Type::from_sql(int())));
                }
                other => panic!("unexpected {}", other),
            },
            other => panic!("unexpected {}", other),
        }
        assert_eq!(imp.zero.ty(), Type::from_sql(nullable_int()));
    }

    #[test]
    fn test_avg_shape() {
        let call = AggregateCall::new(AggFunction::Avg, vec![0], nullable_int());
        let v = row();
        let imp = AggregateCompiler::new(&call, &Type::from_sql(int()), &v)
            .compile()
            .unwrap();
        assert_eq!(
            imp.accumulator_type(),
            Type::RawTuple(vec![Type::i64(true), Type::i64(true)])
        );
        assert!(imp.postprocess.is_some());
        assert_eq!(imp.empty_set_result.ty(), Type::from_sql(nullable_int()));
    }

    #[test]
    fn test_too_many_arguments() {
        let call = AggregateCall::new(AggFunction::Count, vec![0, 1], SqlType::not_null(DataType::BigInt));
        let v = row();
        match AggregateCompiler::new(&call, &Type::i64(false), &v).compile() {
            Err(CompilerError::Unimplemented(_)) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_folding_function_declarations() {
        let mut circuit = Circuit::new("test");
        let calls = vec![
            AggregateCall::new(AggFunction::Count, vec![], SqlType::not_null(DataType::BigInt)),
            AggregateCall::new(AggFunction::Max, vec![1], nullable_int()),
        ];
        let types = vec![Type::i64(false), Type::from_sql(nullable_int())];
        let fd = create_folding_function(&mut circuit, &calls, &types, &row().ty()).unwrap();
        assert_eq!(fd.result_type, Type::Tuple(types.clone()));
        assert_eq!(
            fd.default_zero,
            Expr::Tuple(vec![Expr::int(0, Type::i64(false)), Expr::null(&types[1])])
        );
        let names: Vec<&str> = circuit
            .declarations()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["inc_0", "inc_1", "zero_2", "increment_3", "post_4", "folder_5"]
        );
        match circuit.resolve(&fd.fold) {
            Expr::Fold { postprocess, .. } => assert!(postprocess.is_some()),
            other => panic!("unexpected {}", other),
        }
    }
}

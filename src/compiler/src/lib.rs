//! Compiles relational plans of SQL views into Z-set circuits.
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde;

pub mod aggregate;
pub mod expression;
pub mod join_condition;
pub mod options;
pub mod translate;

pub use options::CompilerOptions;
pub use translate::RelTranslator;

use circuit::{Circuit, Operator, OperatorId, OperatorKind};
use common::catalog::Catalog;
use common::logical_plan::LogicalPlan;
use common::CompilerError;

/// One unit of a compilation.
pub enum Statement {
    /// A table declared in the catalog.
    CreateTable { name: String },
    /// A view defined by a plan. Without `emit_output` the view gets no sink.
    CreateView {
        name: String,
        plan: LogicalPlan,
        emit_output: bool,
    },
}

/// Compiles statements, one at a time, into a single circuit.
pub struct Compiler<T: Catalog> {
    catalog: T,
    options: CompilerOptions,
    circuit: Circuit,
}

impl<T: Catalog> Compiler<T> {
    /// Creates a compiler with an empty circuit named after the options.
    ///
    /// # Arguments
    ///
    /// * `catalog` - Tables visible to the views.
    /// * `options` - Compiler options.
    pub fn new(catalog: T, options: CompilerOptions) -> Self {
        let circuit = Circuit::new(&options.circuit_name);
        Self {
            catalog,
            options,
            circuit,
        }
    }

    pub fn catalog(&self) -> &T {
        &self.catalog
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn into_circuit(self) -> Circuit {
        self.circuit
    }

    /// Compiles one statement and returns the operator it produced, if any.
    pub fn compile_statement(
        &mut self,
        statement: &Statement,
    ) -> Result<Option<OperatorId>, CompilerError> {
        match statement {
            Statement::CreateTable { name } => self.compile_table(name),
            Statement::CreateView {
                name,
                plan,
                emit_output,
            } => self.compile_view(name, plan, *emit_output).map(Some),
        }
    }

    /// Compiles statements in order, stopping at the first failure.
    pub fn compile_all(&mut self, statements: &[Statement]) -> Result<(), CompilerError> {
        for statement in statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    /// Adds a source for `name` when inputs are generated from tables.
    pub fn compile_table(&mut self, name: &str) -> Result<Option<OperatorId>, CompilerError> {
        let table = self.catalog.get_table(name)?;
        if !self.options.generate_inputs_from_tables {
            return Ok(None);
        }
        if self.circuit.get_operator(name).is_some() {
            return Err(CompilerError::ValidationError(format!(
                "Table {} already has an input",
                name
            )));
        }
        let source = translate::add_source(&mut self.circuit, table)?;
        info!("Compiled table {}", name);
        Ok(Some(source))
    }

    /// Compiles the plan of view `name`.
    ///
    /// The circuit is left untouched when the plan fails to compile.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the view.
    /// * `plan` - Plan computing the view.
    /// * `emit_output` - Whether the view gets a sink.
    pub fn compile_view(
        &mut self,
        name: &str,
        plan: &LogicalPlan,
        emit_output: bool,
    ) -> Result<OperatorId, CompilerError> {
        let mut circuit = self.circuit.clone();
        let op = RelTranslator::new(&self.catalog, &self.options, &mut circuit, plan).translate()?;
        let result = if emit_output {
            let output_type = circuit
                .stream_type(op)
                .cloned()
                .ok_or_else(|| CompilerError::TranslationError(format!("unknown {}", op)))?;
            circuit.add_operator(
                Operator::new(OperatorKind::Sink, None, output_type, vec![op]).with_name(name),
            )?
        } else if let Some(existing) = circuit.get_operator(name) {
            existing.id
        } else {
            let output_type = circuit
                .stream_type(op)
                .cloned()
                .ok_or_else(|| CompilerError::TranslationError(format!("unknown {}", op)))?;
            circuit.add_operator(
                Operator::new(OperatorKind::Noop, None, output_type, vec![op]).with_name(name),
            )?
        };
        self.circuit = circuit;
        info!("Compiled view {}", name);
        Ok(result)
    }
}

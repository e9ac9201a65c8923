use circuit::Circuit;
use circuitexe::{CircuitRunner, ZSet};
use common::database::Database;
use common::logical_plan::LogicalPlan;
use compiler::{Compiler, CompilerOptions, Statement};

use criterion::{black_box, Criterion};
use std::collections::HashMap;

/// Tables, views and table contents of one benchmark.
pub struct Template {
    pub ddl: String,
    pub views: Vec<(String, LogicalPlan)>,
    pub data: HashMap<String, ZSet>,
    pub options: CompilerOptions,
}

impl Template {
    pub fn new(ddl: &str) -> Self {
        Self {
            ddl: ddl.to_string(),
            views: Vec::new(),
            data: HashMap::new(),
            options: CompilerOptions::default(),
        }
    }

    pub fn add_view(&mut self, name: &str, plan: LogicalPlan) {
        self.views.push((name.to_string(), plan));
    }

    pub fn show_configuration(&self) {
        println!(
            "{} views over {} loaded tables, {:?}",
            self.views.len(),
            self.data.len(),
            self.options
        );
    }

    pub fn compile(&self) -> Circuit {
        let db = Database::from_ddl("bench", &self.ddl).unwrap();
        let mut compiler = Compiler::new(db, self.options.clone());
        for (name, plan) in self.views.iter() {
            compiler
                .compile_statement(&Statement::CreateView {
                    name: name.clone(),
                    plan: LogicalPlan::from_json(&plan.to_json().to_string()).unwrap(),
                    emit_output: true,
                })
                .unwrap();
        }
        compiler.into_circuit()
    }

    /// Time to translate every view.
    pub fn bench_translation(&self, c: &mut Criterion, name: &str) {
        c.bench_function(name, |b| b.iter(|| black_box(self.compile())));
    }

    /// Time for a fresh runner to evaluate one step over the loaded tables.
    pub fn bench_evaluation(&self, c: &mut Criterion, name: &str) {
        let circuit = self.compile();
        c.bench_function(name, |b| {
            b.iter(|| {
                let mut runner = CircuitRunner::new(&circuit);
                black_box(runner.step(&self.data).unwrap())
            })
        });
    }
}

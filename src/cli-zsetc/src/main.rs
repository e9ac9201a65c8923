extern crate clap;
use circuitexe::{render, zset_from_rows, CircuitRunner, ZSet};
use clap::{App, Arg, ArgMatches};
use common::catalog::Catalog;
use common::csv_utils::import_csv;
use common::database::Database;
use common::logical_plan::LogicalPlan;
use common::{CompilerError, TableSchema};
use compiler::{Compiler, CompilerOptions};
use env_logger::Env;
use log::{debug, error, info};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};

/// One entry of the plan file.
#[derive(Deserialize, Debug)]
struct ViewPlan {
    view: String,
    plan: serde_json::Value,
    #[serde(default = "emit_by_default")]
    emit_output: bool,
}

fn emit_by_default() -> bool {
    true
}

/// Splits a `TABLE=FILE.csv` argument.
fn parse_data_arg(arg: &str) -> Result<(String, String), CompilerError> {
    let mut parts = arg.splitn(2, '=');
    match (parts.next(), parts.next()) {
        (Some(table), Some(path)) if !table.is_empty() && !path.is_empty() => {
            Ok((table.to_string(), path.to_string()))
        }
        _ => Err(CompilerError::ValidationError(format!(
            "Expected TABLE=FILE, got {}",
            arg
        ))),
    }
}

fn read_options(matches: &ArgMatches) -> Result<CompilerOptions, CompilerError> {
    let mut options = match matches.value_of("config") {
        Some(path) => CompilerOptions::from_json(&fs::read_to_string(path)?)?,
        None => CompilerOptions::default(),
    };
    if matches.is_present("inputs") {
        options.generate_inputs_from_tables = true;
    }
    if matches.is_present("incremental") {
        options.incremental_aggregates = true;
    }
    if matches.is_present("cbor") {
        options.emit_json = false;
    }
    Ok(options)
}

fn run(matches: &ArgMatches) -> Result<(), CompilerError> {
    let options = read_options(matches)?;
    info!("Compiling with options: {:?}", options);

    let ddl_path = matches.value_of("ddl").unwrap_or_default();
    let mut db = Database::new(String::from("zsetc"));
    let tables = db.execute_ddl(&fs::read_to_string(ddl_path)?)?;
    debug!("Declared tables {:?}", tables);

    let plan_path = matches.value_of("plan").unwrap_or_default();
    let mut views: Vec<ViewPlan> = serde_json::from_str(&fs::read_to_string(plan_path)?)?;
    if let Some(selected) = matches.values_of("view") {
        let selected: Vec<&str> = selected.collect();
        for name in selected.iter() {
            if !views.iter().any(|v| v.view == *name) {
                return Err(CompilerError::ValidationError(format!(
                    "View {} not found in {}",
                    name, plan_path
                )));
            }
        }
        views.retain(|v| selected.contains(&v.view.as_str()));
    }

    let mut data = Vec::new();
    if let Some(args) = matches.values_of("data") {
        for arg in args {
            data.push(parse_data_arg(arg)?);
        }
    }

    let mut compiler = Compiler::new(db, options.clone());
    for table in tables.iter() {
        compiler.compile_table(table)?;
    }
    let mut schemas: HashMap<String, TableSchema> = HashMap::new();
    for view in views.iter() {
        let plan = LogicalPlan::from_value(&view.plan)?;
        compiler.compile_view(&view.view, &plan, view.emit_output)?;
        if let Some(root) = plan.root().and_then(|r| plan.get_operator(r)) {
            schemas.insert(view.view.clone(), root.schema().clone());
        }
    }

    let mut contents = HashMap::new();
    for (table, path) in data.iter() {
        let schema = compiler.catalog().get_table_schema(table)?;
        let rows = import_csv(path, &schema)?;
        contents.insert(table.clone(), zset_from_rows(rows));
    }

    let circuit = compiler.into_circuit();
    let bytes = if options.emit_json {
        circuit.to_json()?.into_bytes()
    } else {
        circuit.to_cbor()?
    };
    match matches.value_of("output") {
        Some(path) => {
            fs::write(path, &bytes)?;
            info!("Wrote circuit {} to {}", circuit.name(), path);
        }
        None if data.is_empty() => io::stdout().write_all(&bytes)?,
        None => (),
    }

    if !data.is_empty() {
        let mut runner = CircuitRunner::new(&circuit);
        let results = runner.step(&contents)?;
        let empty = ZSet::new();
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for view in views.iter().filter(|v| v.emit_output) {
            let zset = results.get(&view.view).unwrap_or(&empty);
            writeln!(out, "{}:", view.view)?;
            write!(out, "{}", render(schemas.get(&view.view), zset))?;
        }
    }
    Ok(())
}

fn main() {
    // Configure log environment
    env_logger::from_env(Env::default().default_filter_or("info")).init();

    let matches = App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::with_name("ddl")
                .short("d")
                .long("ddl")
                .value_name("DDL_FILE")
                .help("Semicolon delimited CREATE TABLE statements")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("plan")
                .short("p")
                .long("plan")
                .value_name("PLAN_FILE")
                .help("Json list of {\"view\", \"plan\", \"emit_output\"} entries")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("view")
                .long("view")
                .value_name("VIEW")
                .help("Only compile the named view; may be repeated")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Sets a custom compiler config file")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .value_name("FILE")
                .help("Writes the circuit to FILE instead of stdout")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("cbor")
                .long("cbor")
                .help("Serializes the circuit as cbor"),
        )
        .arg(
            Arg::with_name("inputs")
                .long("inputs-from-tables")
                .help("Creates a source for every declared table"),
        )
        .arg(
            Arg::with_name("incremental")
                .long("incremental-aggregates")
                .help("Uses incremental aggregation operators"),
        )
        .arg(
            Arg::with_name("data")
                .long("data")
                .value_name("TABLE=FILE")
                .help("Loads a csv file into a table and evaluates the circuit once")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
        .get_matches();

    if let Err(e) = run(&matches) {
        error!("{}", e);
        std::process::exit(1);
    }
    info!("Terminated.");
}

use crate::catalog::Catalog;
use crate::table::*;
use crate::{get_column, get_name, CompilerError, TableSchema};
use sqlparser::ast::{ColumnDef, Statement};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::collections::HashMap;

/// A set of table definitions.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct Database {
    /// Name of the database.
    pub name: String,
    /// Tables, keyed by name.
    pub tables: HashMap<String, Table>,
}

impl Database {
    /// Initialize a new database with a given name.
    ///
    /// # Arguments
    ///
    /// * `name` - Name for the new database.
    pub fn new(name: String) -> Self {
        Database {
            name,
            tables: HashMap::new(),
        }
    }

    /// Registers a table. Redefining a table is an error.
    pub fn add_table(&mut self, table: Table) -> Result<(), CompilerError> {
        if self.tables.contains_key(&table.name) {
            return Err(CompilerError::ValidationError(format!(
                "Table {} already exists",
                table.name
            )));
        }
        debug!("Adding table {} with {} columns", table.name, table.schema.size());
        self.tables.insert(table.name.clone(), table);
        Ok(())
    }

    /// Creates a table from parsed column definitions.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the table.
    /// * `columns` - Column definitions.
    /// * `statement` - Text of the defining statement.
    pub fn create_table(
        &mut self,
        name: &str,
        columns: &[ColumnDef],
        statement: String,
    ) -> Result<&Table, CompilerError> {
        let mut attributes = Vec::new();
        for col in columns {
            attributes.push(get_column(col)?);
        }
        let table = Table::new(name.to_string(), TableSchema::new(attributes)).with_statement(statement);
        self.add_table(table)?;
        self.get_table(name)
    }

    /// Executes every `CREATE TABLE` statement in `sql`.
    ///
    /// Returns the names of the created tables in statement order.
    pub fn execute_ddl(&mut self, sql: &str) -> Result<Vec<String>, CompilerError> {
        let dialect = GenericDialect {};
        let statements = Parser::parse_sql(&dialect, sql.to_string())
            .map_err(|e| CompilerError::ParseError(format!("{:?}", e)))?;
        let mut created = Vec::new();
        for statement in statements.iter() {
            match statement {
                Statement::CreateTable { name, columns, .. } => {
                    let table_name = get_name(name)?;
                    info!("Processing CREATE table: {:?}", table_name);
                    self.create_table(&table_name, columns, statement.to_string())?;
                    created.push(table_name);
                }
                _ => {
                    return Err(CompilerError::Unimplemented(format!(
                        "only CREATE TABLE is accepted in DDL, got: {}",
                        statement
                    )))
                }
            }
        }
        Ok(created)
    }

    /// Builds a database from a DDL script.
    pub fn from_ddl(name: &str, sql: &str) -> Result<Self, CompilerError> {
        let mut db = Database::new(name.to_string());
        db.execute_ddl(sql)?;
        Ok(db)
    }
}

impl Catalog for Database {
    /// Gets the tables from the catalog of the database.
    fn get_tables(&self) -> &HashMap<String, Table> {
        &self.tables
    }
}

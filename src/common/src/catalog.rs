use crate::table::*;
use crate::{CompilerError, TableSchema};
use std::collections::HashMap;

/// Functions needed to implement a catalog. It keeps track of all available tables and their associated schemas.
pub trait Catalog {
    /// Get tables from catalog, keyed by name.
    fn get_tables(&self) -> &HashMap<String, Table>;

    /// Get a table from the catalog.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the table.
    fn get_table(&self, name: &str) -> Result<&Table, CompilerError> {
        self.get_tables()
            .get(name)
            .ok_or_else(|| CompilerError::ValidationError(format!("Table {} not found", name)))
    }

    /// Checks if the table name is valid in the catalog.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of table to check.
    fn is_valid_table(&self, name: &str) -> bool {
        self.get_tables().contains_key(name)
    }

    /// Checks if the column is valid for the given table.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of table to look for the column name in.
    /// * `col_name` - Name of column to look for in the table.
    fn is_valid_column(&self, name: &str, col_name: &str) -> bool {
        match self.get_tables().get(name) {
            Some(table) => table.schema.get_field_index(col_name).is_some(),
            None => false,
        }
    }

    /// Gets the table schema from the catalog.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of table to get the schema for.
    fn get_table_schema(&self, name: &str) -> Result<TableSchema, CompilerError> {
        self.get_table(name).map(|t| t.schema.clone())
    }
}

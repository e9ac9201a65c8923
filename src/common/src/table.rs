use crate::TableSchema;

/// Table implementation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Table schema.
    pub schema: TableSchema,
    /// Text of the statement that created the table, kept as a comment for the circuit source.
    pub statement: Option<String>,
}

impl Table {
    /// Creates a new table with the given name and schema.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of table.
    /// * `schema` - Schema of the table.
    pub fn new(name: String, schema: TableSchema) -> Self {
        Table {
            name,
            schema,
            statement: None,
        }
    }

    /// Attaches the defining statement.
    pub fn with_statement(mut self, statement: String) -> Self {
        self.statement = Some(statement);
        self
    }
}

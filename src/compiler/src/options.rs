use common::CompilerError;

/// Settings that change the shape of the generated circuit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CompilerOptions {
    /// Create a source for every CREATE TABLE. A scan of a table without a source is then an error.
    pub generate_inputs_from_tables: bool,
    /// Emit IncrementalAggregate between a Differential and an Integral instead of Aggregate.
    pub incremental_aggregates: bool,
    /// Serialize the circuit as json rather than cbor.
    pub emit_json: bool,
    pub circuit_name: String,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            generate_inputs_from_tables: false,
            incremental_aggregates: false,
            emit_json: true,
            circuit_name: String::from("circuit"),
        }
    }
}

impl CompilerOptions {
    /// Reads options from a json document; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, CompilerError> {
        Ok(serde_json::from_str(json)?)
    }
}

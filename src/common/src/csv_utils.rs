use crate::{CompilerError, Field, TableSchema};
use std::fs::File;
use std::io::Read;

/// Reads rows of `schema` from a headerless csv source.
///
/// Empty cells and the text `NULL` become NULL; a NULL in a non-nullable column is rejected.
///
/// # Arguments
///
/// * `reader` - Source of csv text.
/// * `schema` - Schema the rows must conform to.
pub fn read_rows<R: Read>(reader: R, schema: &TableSchema) -> Result<Vec<Vec<Field>>, CompilerError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(reader);
    let mut rows = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let rec = result.map_err(|e| CompilerError::ParseError(e.to_string()))?;
        if rec.len() != schema.size() {
            return Err(CompilerError::ParseError(format!(
                "line {}: expected {} fields, found {}",
                line + 1,
                schema.size(),
                rec.len()
            )));
        }
        let mut row = Vec::with_capacity(rec.len());
        for (text, attr) in rec.iter().zip(schema.attributes()) {
            let field = Field::parse(text.trim(), attr.dtype)?;
            if field.is_null() && !attr.nullable {
                return Err(CompilerError::ValidationError(format!(
                    "line {}: NULL in non-nullable column {}",
                    line + 1,
                    attr.name
                )));
            }
            row.push(field);
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Function to import csv data for a table.
///
/// # Arguments
///
/// * `path` - Path to the csv file.
/// * `schema` - Schema of the table.
pub fn import_csv(path: &str, schema: &TableSchema) -> Result<Vec<Vec<Field>>, CompilerError> {
    debug!("common::csv_utils trying to open file, path: {:?}", path);
    let file = File::open(path)?;
    let rows = read_rows(file, schema)?;
    info!("Num records imported: {:?}", rows.len());
    Ok(rows)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{DataType, SqlType};

    fn schema() -> TableSchema {
        TableSchema::from_vecs(
            vec!["a", "b"],
            vec![
                SqlType::not_null(DataType::Int),
                SqlType::nullable(DataType::Varchar),
            ],
        )
    }

    #[test]
    fn test_read_rows() {
        let rows = read_rows("1,x\n2,\n".as_bytes(), &schema()).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Field::IntField(1), Field::string("x")],
                vec![Field::IntField(2), Field::Null],
            ]
        );
    }

    #[test]
    fn test_null_in_non_nullable() {
        assert!(read_rows(",x\n".as_bytes(), &schema()).is_err());
        assert!(read_rows("1,x,3\n".as_bytes(), &schema()).is_err());
    }
}

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IrError {
    #[error("Column '{column}' not found. Available columns: {available:?}")]
    ColumnNotFound {
        column: String,
        available: Vec<String>,
    },

    #[error("Struct field '{0}' not found")]
    FieldNotFound(String),

    #[error("Expected a table expression, got {0}")]
    NotATable(String),

    #[error("Expected a value expression, got {0}")]
    NotAValue(String),

    #[error("Expression has no name and cannot be projected: {0}")]
    Unnamed(String),

    #[error("Invalid type: {0}")]
    InvalidType(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Cannot infer the element type of an empty collection")]
    EmptyCollection,

    #[error("Table not found: {0}")]
    TableNotFound(String),
}

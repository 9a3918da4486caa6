use thiserror::Error;
use vektor_registry::RegistryError;

/// Failures while turning an expression tree into wire messages.
///
/// These point at a mismatch between the caller's tree and what the codec
/// supports, never at bad external data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EncodeError {
    #[error("Integer value {0} outside of supported range")]
    IntegerOutOfRange(i128),

    #[error("Unsupported literal: {0}")]
    UnsupportedLiteral(String),

    #[error("Unable to format node: {0}")]
    Unformattable(#[from] RegistryError),
}

/// Root of every deserialization failure.
///
/// The three narrow kinds (`DataType`, `Operation`, `Literal`) cover unknown
/// type names, unknown operators and unusable literal payloads; `Invalid`
/// covers everything else a malformed payload can get wrong, such as an
/// alias pointing outside the table-ref list.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeserializeError {
    #[error("Data type error: {0}")]
    DataType(String),

    #[error("Operation error: {0}")]
    Operation(String),

    #[error("Literal deserialization error: {0}")]
    Literal(String),

    #[error("Deserialization error: {0}")]
    Invalid(String),
}

impl DeserializeError {
    pub fn is_data_type_error(&self) -> bool {
        matches!(self, DeserializeError::DataType(_))
    }

    pub fn is_operation_error(&self) -> bool {
        matches!(self, DeserializeError::Operation(_))
    }

    pub fn is_literal_error(&self) -> bool {
        matches!(self, DeserializeError::Literal(_))
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        DeserializeError::Invalid(msg.into())
    }
}

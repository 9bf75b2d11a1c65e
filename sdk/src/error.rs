use bidl_bson::{BsonError, ElementType};
use thiserror::Error;

fn join_types(types: &[ElementType]) -> String {
    types
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised by generated parsers, validators and registries.
///
/// Field names are dotted paths built from the [ParserContext](crate::ParserContext)
/// chain, e.g. `Example.point.x`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IdlError {
    #[error("BSON field '{field}' is a duplicate field")]
    DuplicateField {
        field: String,
    },

    #[error("BSON field '{field}' is missing but a required field")]
    MissingField {
        field: String,
    },

    #[error("BSON field '{field}' is an unknown field")]
    UnknownField {
        field: String,
    },

    #[error("BSON field '{field}' is the wrong type '{found}', expected type '{}'", join_types(.expected))]
    TypeMismatch {
        field:    String,
        expected: Vec<ElementType>,
        found:    ElementType,
    },

    #[error("BSON field '{field}' has bindata subtype {found}, expected subtype {expected}")]
    BadBinDataSubtype {
        field:    String,
        expected: u8,
        found:    u8,
    },

    #[error("BSON array field '{field}' has a non-sequential value '{actual}' for an array field name, expected value '{expected}'")]
    BadArrayFieldNumberSequence {
        field:    String,
        actual:   u32,
        expected: u32,
    },

    #[error("BSON array field '{field}' has an invalid value '{value}' for an array field name")]
    BadArrayFieldNumberValue {
        field: String,
        value: String,
    },

    #[error("BSON field '{field}' has an invalid enumeration value '{value}'")]
    BadEnumValue {
        field: String,
        value: String,
    },

    #[error("BSON field '{field}' value must be {op} {limit}, actual value '{value}'")]
    Comparison {
        field: String,
        op:    String,
        value: String,
        limit: String,
    },

    #[error("Invalid namespace specified '{0}'")]
    InvalidNamespace(String),

    #[error("{0}")]
    Validation(String),

    #[error("Server parameter error: {0}")]
    ServerParameter(String),

    #[error("Startup option error: {0}")]
    StartupOption(String),

    #[error("Document decode error: {0}")]
    Decode(#[from] BsonError),
}

impl IdlError {
    /// The dotted field path for errors that carry one.
    pub fn field(&self) -> Option<&str> {
        match self {
            IdlError::DuplicateField { field }
            | IdlError::MissingField { field }
            | IdlError::UnknownField { field }
            | IdlError::TypeMismatch { field, .. }
            | IdlError::BadBinDataSubtype { field, .. }
            | IdlError::BadArrayFieldNumberSequence { field, .. }
            | IdlError::BadArrayFieldNumberValue { field, .. }
            | IdlError::BadEnumValue { field, .. }
            | IdlError::Comparison { field, .. } => Some(field.as_str()),
            _ => None,
        }
    }
}

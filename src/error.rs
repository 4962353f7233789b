use crate::filter::FilterParseError;
use thiserror::Error;

/// Failure to describe a type while filtering
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntrospectionError {
    #[error("Unknown type '{0}'")]
    UnknownType(String),
    #[error("Type '{type_name}' declares field '{field}' with unknown type '{field_type}'")]
    UnknownFieldType {
        type_name: String,
        field: String,
        field_type: String,
    },
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error(transparent)]
    Syntax(#[from] FilterParseError),
    #[error(transparent)]
    Introspection(#[from] IntrospectionError),
}

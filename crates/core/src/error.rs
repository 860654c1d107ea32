use medrec_types::{AgeError, TextError};

use crate::record::FormField;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid text: {0}")]
    Text(#[from] TextError),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// A field edit that was rejected. The record is left unchanged.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EditError {
    #[error("field {field} expects a {expected} value")]
    TypeMismatch {
        field: FormField,
        expected: &'static str,
    },
    #[error("invalid patient age: {0}")]
    Age(#[from] AgeError),
}

//! Shared error types for the missing-data experiment pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },

    #[error("Invalid subject identifier: '{input}'")]
    InvalidSubject { input: String },
}

pub type SharedResult<T> = Result<T, SharedError>;

//! Error types for the catalog-schema CLI

use catalog_schema_core::SchemaError;
use thiserror::Error;

/// Errors that can occur while replaying an editor script
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("line {line}: {source}")]
    Schema {
        line: usize,
        #[source]
        source: SchemaError,
    },
}

pub type Result<T> = std::result::Result<T, ScriptError>;

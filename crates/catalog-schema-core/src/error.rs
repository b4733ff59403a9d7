//! Error types for the schema editor.

use catalog_schema_engine::{HeaderId, Slot};
use thiserror::Error;

use crate::client::ClientError;

/// Errors that can occur while editing or submitting a schema.
///
/// Every variant is recoverable: the operation that produced it left the
/// registry and editor state untouched.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Unknown header: {0}")]
    UnknownHeader(HeaderId),

    #[error("Unknown base column id: {0}")]
    UnknownBaseColumn(u8),

    #[error("Header \"{0}\" is already present")]
    HeaderExists(String),

    #[error("Header \"{0}\" cannot be removed")]
    NotRemovable(String),

    #[error("Header \"{0}\" is not editable")]
    NotEditable(String),

    #[error("Indicate whether header \"{header}\" is a quantity before creating a calculation")]
    QuantityUnanswered { header: String },

    #[error("Header \"{header}\" does not support calculations")]
    CalculationUnsupported { header: String },

    #[error("No operand at {slot} in header \"{header}\"")]
    InvalidSlot { header: String, slot: Slot },

    #[error("\"{candidate}\" is already used in the calculation of \"{target}\"")]
    OperandExcluded { candidate: String, target: String },

    #[error("\"{0}\" cannot be used as an operand")]
    NotSelectable(String),

    #[error("Circular dependency detected: {}", path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    #[error("Complete the calculation of header \"{header}\"")]
    IncompleteFormula { header: String },

    #[error("The table title is required")]
    MissingTitle,

    #[error("Answer whether header \"{header}\" is a quantity before continuing")]
    PendingQuantityQuestion { header: String },

    #[error("Submission failed: {0}")]
    Client(#[from] ClientError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SchemaError>;

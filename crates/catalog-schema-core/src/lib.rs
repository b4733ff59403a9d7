//! catalog-schema-core - UI-agnostic schema editor.
//!
//! Holds the header registry of a material table schema, the interactive
//! formula editor driven by the rendering layer, and the translation of the
//! finished registry into the persistence backend's submission payload.

pub mod client;
pub mod editor;
pub mod error;
pub mod header;
pub mod payload;
pub mod registry;
pub mod settings;

pub use client::{ClientError, MemoryClient, SchemaClient};
pub use editor::{
    DeletePrompt, EditBackup, Editor, Event, Highlights, Mode, Outcome, SelectionState,
};
pub use error::{Result, SchemaError};
pub use header::{BaseColumn, Header, TOTAL_ORDER};
pub use payload::{
    AttributeColumn, BaseFormula, FormulaPayload, GroupPayload, OrderEntry, SchemaSubmission,
    StoredAttributeHeader, StoredBaseHeader, StoredFormula, StoredGroup, StoredSchema,
    build_formula_payload, build_submission, prepare_submission, validate,
};
pub use registry::Registry;
pub use settings::Settings;

pub use catalog_schema_engine::{
    ColumnKind, Formula, HeaderId, Operand, OperandGroup, Operator, Slot,
};

//! Translation between the in-memory registry and the persistence backend's
//! position-indexed contract.

mod build;
mod stored;

pub use build::{
    AttributeColumn, BaseFormula, FormulaPayload, GroupPayload, OrderEntry, SchemaSubmission,
    build_formula_payload, build_submission, prepare_submission, validate,
};
pub use stored::{StoredAttributeHeader, StoredBaseHeader, StoredFormula, StoredGroup, StoredSchema};

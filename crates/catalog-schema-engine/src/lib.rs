//! catalog-schema-engine - derived-column formula model.
//!
//! Nothing in here knows about the header registry: a formula only holds
//! [`HeaderId`] references and display titles, so it can be evaluated,
//! formatted and checked for cycles in isolation.

pub mod formula;

pub use formula::{
    ColumnKind, DependencyGraph, Formula, HeaderId, Operand, OperandGroup, Operator, Slot,
    dependency_graph, detect_cycle, evaluate, format_expression,
};

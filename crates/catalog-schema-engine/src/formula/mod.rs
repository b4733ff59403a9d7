//! Derived-column formula API.
//!
//! - [`Formula`], [`OperandGroup`], [`Operand`] - the stored shape of a formula
//! - [`Slot`] - position of one operand inside a formula
//! - [`evaluate`] - left-to-right evaluation against resolved column values
//! - [`format_expression`] - human readable rendering (`A × B ÷ C`)
//! - [`dependency_graph`], [`detect_cycle`] - cross-formula cycle detection

mod cycle;
mod deps;
mod eval;
mod format;
mod operand;

pub use cycle::detect_cycle;
pub use deps::{DependencyGraph, dependency_graph};
pub use eval::evaluate;
pub use format::format_expression;
pub use operand::{ColumnKind, Formula, HeaderId, Operand, OperandGroup, Operator, Slot};

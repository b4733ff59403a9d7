//! Header registry (UI-agnostic).

mod calc;
mod ops;
mod state;

pub use state::Registry;

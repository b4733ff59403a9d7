//! Interactive formula editing (UI-agnostic).

mod highlight;
mod prompt;
mod state;
mod submit;
mod transitions;

pub use highlight::Highlights;
pub use prompt::DeletePrompt;
pub use state::{EditBackup, Editor, Mode, SelectionState};
pub use transitions::{Event, Outcome};

//! Editor settings.

use serde::Deserialize;
use std::time::Duration;

/// Tunables shared by the editor, the registry and the payload builder.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// How long a highlighted column keeps flashing, in milliseconds.
    pub highlight_ms: u64,
    /// Rendered in place of unfilled operands and blank titles.
    pub placeholder: String,
    /// Title used for custom headers left blank.
    pub fallback_title: String,
}

impl Settings {
    pub fn highlight_duration(&self) -> Duration {
        Duration::from_millis(self.highlight_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            highlight_ms: 1000,
            placeholder: "---".to_string(),
            fallback_title: "Header".to_string(),
        }
    }
}

//! Settings file loading.

use catalog_schema_core::Settings;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Refuse config files larger than this.
const MAX_CONFIG_BYTES: u64 = 1024 * 1024;

fn user_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "catalog-schema")?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("config.toml");
    Some(path)
}

/// Load settings from `config_file`, or from the user config dir when none
/// is given.
///
/// Never fails: problems are returned as warnings and defaults are used. A
/// missing default file is not worth a warning; a missing explicit one is.
pub fn load_settings(config_file: Option<&Path>) -> (Settings, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();
    let Some(path) = config_file.map(Path::to_path_buf).or_else(user_config_path) else {
        return (Settings::default(), warnings);
    };

    if !path.exists() {
        if config_file.is_some() {
            warnings.push(format!("Config file not found: {}", path.display()));
        }
        return (Settings::default(), warnings);
    }

    match std::fs::metadata(&path) {
        Ok(meta) if meta.len() > MAX_CONFIG_BYTES => {
            warnings.push(format!(
                "Config file too large ({} bytes): {}",
                meta.len(),
                path.display()
            ));
            return (Settings::default(), warnings);
        }
        Ok(_) => {}
        Err(err) => {
            warnings.push(format!("Failed to read {}: {}", path.display(), err));
            return (Settings::default(), warnings);
        }
    }

    let settings = match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str::<Settings>(&content) {
            Ok(parsed) => parsed,
            Err(err) => {
                warnings.push(format!("Failed to parse {}: {}", path.display(), err));
                Settings::default()
            }
        },
        Err(err) => {
            warnings.push(format!("Failed to read {}: {}", path.display(), err));
            Settings::default()
        }
    };
    (settings, warnings)
}

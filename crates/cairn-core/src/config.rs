use crate::CoreError;
use cairn_schema::ContainerType;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// User preferences read from `~/.config/cairn/config.toml`.
///
/// Every field is optional; command-line values win over these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CairnConfig {
    pub default_type: Option<ContainerType>,
    pub default_distro: Option<String>,
    pub interactive: bool,
}

impl CairnConfig {
    /// Load the per-user config. A missing file yields the defaults.
    pub fn load_default() -> Result<Self, CoreError> {
        match default_config_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&content)
            .map_err(|e| CoreError::Config(format!("invalid config {}: {e}", path.display())))
    }
}

fn default_config_path() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir).join("cairn/config.toml"));
    }
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/cairn/config.toml"))
}

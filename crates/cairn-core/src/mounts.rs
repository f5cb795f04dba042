use crate::CoreError;
use cairn_runtime::HostInfo;
use cairn_schema::{normalize_absolute_path, ContainerType, SchemaError};
use std::path::{Path, PathBuf};

/// Where bind mounts may come from: the invoking user's home directory, or
/// that user's removable media under `/media/<user>`.
///
/// Without a usable home directory only removable media is allowed. A home of
/// `/` counts as none.
#[derive(Debug, Clone)]
pub struct MountPolicy {
    home: Option<PathBuf>,
    media: PathBuf,
}

impl MountPolicy {
    pub fn new(home: Option<PathBuf>, user: &str) -> Self {
        let home = home.filter(|h| h.is_absolute() && h.parent().is_some());
        Self {
            home,
            media: Path::new("/media").join(user),
        }
    }

    pub fn from_host(host: &dyn HostInfo) -> Self {
        Self::new(host.home_dir(), &host.user_name())
    }

    /// Validate `path` for a container of `kind` and return its normalized form.
    pub fn validate(&self, path: &str, kind: ContainerType) -> Result<String, CoreError> {
        let normalized = normalize_absolute_path(path)?;
        let candidate = Path::new(&normalized);

        if candidate.starts_with(&self.media) {
            if kind == ContainerType::Lxc {
                return Err(CoreError::Unsupported(format!(
                    "bind mount '{normalized}' from removable media is not supported for lxc containers"
                )));
            }
            return Ok(normalized);
        }
        if let Some(home) = &self.home {
            if candidate.starts_with(home) {
                return Ok(normalized);
            }
        }
        let reason = match &self.home {
            Some(home) => format!(
                "must be under {} or {}",
                home.display(),
                self.media.display()
            ),
            None => format!(
                "must be under {} (no home directory is set)",
                self.media.display()
            ),
        };
        Err(SchemaError::InvalidPath {
            path: normalized,
            reason,
        }
        .into())
    }
}

//! Container registry and persistence for Cairn.
//!
//! This crate provides the storage layer: the in-memory `Registry` of container
//! records with their nested packages, archives and bind mounts, the codec that
//! loads, atomically saves and merges the registry file, and `StoreLayout` for
//! locating the registry, lock file and container roots on disk.

pub mod codec;
pub mod layout;
pub mod registry;

pub use codec::{load, merge, save, to_json, REGISTRY_FORMAT_VERSION};
pub use layout::StoreLayout;
pub use registry::{ArchiveRecord, ContainerRecord, PackageRecord, Registry};

use cairn_schema::SchemaError;
use std::path::Path;
use thiserror::Error;

/// Fsync a directory so that a preceding `rename()` is durable.
///
/// POSIX does not guarantee rename durability without it, whatever the
/// filesystem's default journaling mode.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("registry file '{path}' is not valid: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("registry format version mismatch: supported {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("registry is inconsistent: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("container '{0}' does not exist")]
    ContainerNotFound(String),
    #[error("package '{package}' not found in container '{container}'")]
    PackageNotFound { container: String, package: String },
    #[error("archive '{archive}' not found in container '{container}'")]
    ArchiveNotFound { container: String, archive: String },
    #[error("bind mount '{path}' not found in container '{container}'")]
    BindMountNotFound { container: String, path: String },
    #[error("container '{0}' already exists")]
    ContainerExists(String),
    #[error("package '{package}' already present in container '{container}'")]
    PackageExists { container: String, package: String },
    #[error("archive '{archive}' already present in container '{container}'")]
    ArchiveExists { container: String, archive: String },
    #[error("bind mount '{path}' already present in container '{container}'")]
    BindMountExists { container: String, path: String },
    #[error("no default container is set; pass a container id or set a default")]
    NoDefaultContainer,
    #[error("no containers exist")]
    NoContainers,
    #[error("refusing to {0} without confirmation")]
    ConfirmationRequired(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::ContainerNotFound(_)
                | StoreError::PackageNotFound { .. }
                | StoreError::ArchiveNotFound { .. }
                | StoreError::BindMountNotFound { .. }
        )
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            StoreError::ContainerExists(_)
                | StoreError::PackageExists { .. }
                | StoreError::ArchiveExists { .. }
                | StoreError::BindMountExists { .. }
        )
    }
}

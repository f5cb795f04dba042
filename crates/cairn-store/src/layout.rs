use crate::StoreError;
use std::fs;
use std::path::{Path, PathBuf};

const REGISTRY_FILE: &str = "containers.json";

/// Directory layout of a Cairn store.
///
/// One store per host holds the registry file, the advisory lock, and the
/// per-container root directories handed to the drivers.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn registry_file(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.root.join(".lock")
    }

    #[inline]
    pub fn containers_dir(&self) -> PathBuf {
        self.root.join("containers")
    }

    #[inline]
    pub fn container_path(&self, id: &str) -> PathBuf {
        self.containers_dir().join(id)
    }

    /// The root filesystem handed to the chroot driver.
    #[inline]
    pub fn rootfs_dir(&self, id: &str) -> PathBuf {
        self.container_path(id).join("rootfs")
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)?;
        fs::create_dir_all(self.containers_dir())?;
        Ok(())
    }
}

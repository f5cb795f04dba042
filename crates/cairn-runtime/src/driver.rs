use crate::RuntimeError;
use cairn_schema::{ContainerId, ContainerType};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything a driver needs to address one container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerSpec {
    pub id: ContainerId,
    pub kind: ContainerType,
    pub distro: String,
    pub architecture: String,
    /// Root filesystem location, used by the chroot backend.
    pub root_path: PathBuf,
    pub multiarch: bool,
    pub locale: Option<String>,
    /// Host user the container is prepared for.
    pub user: String,
    pub bind_mounts: Vec<String>,
}

/// Backend operations the orchestrator delegates to.
///
/// Implementations only report success or failure; the orchestrator never
/// inspects driver-internal state. Every call blocks until the backend is done.
pub trait ContainerDriver: Send + Sync {
    fn name(&self) -> &str;

    fn create(&self, spec: &ContainerSpec, password: Option<&str>) -> Result<(), RuntimeError>;

    fn destroy(&self, spec: &ContainerSpec, force: bool) -> Result<(), RuntimeError>;

    /// Run a shell command line inside the container.
    fn exec(&self, spec: &ContainerSpec, command: &str) -> Result<(), RuntimeError>;

    /// Install one package. `update_cache` refreshes the package index first.
    fn install_package(
        &self,
        spec: &ContainerSpec,
        package: &str,
        interactive: bool,
        update_cache: bool,
    ) -> Result<(), RuntimeError>;

    fn remove_package(
        &self,
        spec: &ContainerSpec,
        package: &str,
        interactive: bool,
    ) -> Result<(), RuntimeError>;

    fn restart(&self, spec: &ContainerSpec) -> Result<(), RuntimeError>;

    fn binary_exists(&self, spec: &ContainerSpec, name: &str) -> bool;

    /// Search the container's package cache. Returns the search tool's exit code.
    fn search_cache(&self, spec: &ContainerSpec, query: &str) -> Result<i32, RuntimeError>;
}

pub fn select_driver(name: &str) -> Result<Box<dyn ContainerDriver>, RuntimeError> {
    match name {
        "process" => Ok(Box::new(crate::process::ProcessDriver::new())),
        "mock" => Ok(Box::new(crate::mock::MockDriver::new())),
        other => Err(RuntimeError::DriverUnavailable(other.to_owned())),
    }
}

/// Quote `s` for safe interpolation into a POSIX shell command line.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

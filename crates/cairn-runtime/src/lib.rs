//! Container drivers and host capability detection for Cairn.
//!
//! This crate implements the collaborator side of the orchestrator: the
//! `ContainerDriver` trait with a process-spawning driver for LXC, LXD and
//! chroot containers and a recording mock driver, the `HostInfo` trait with a
//! system-backed host and a mock host, and prerequisite checks for each backend.

pub mod driver;
pub mod host;
pub mod mock;
pub mod prereq;
pub mod process;

pub use driver::{select_driver, shell_quote, ContainerDriver, ContainerSpec};
pub use host::{HostInfo, SystemHost, SUPPORTED_RELEASES};
pub use mock::{DriverCall, MockDriver, MockHost};
pub use prereq::{
    check_chroot_prereqs, check_lxc_prereqs, check_lxd_prereqs, format_missing, MissingPrereq,
};
pub use process::ProcessDriver;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("driver '{0}' is not available")]
    DriverUnavailable(String),
    #[error("command `{command}` failed: {detail}")]
    CommandFailed { command: String, detail: String },
    #[error("runtime execution failed: {0}")]
    ExecFailed(String),
}

//! Lifecycle orchestration for Cairn containers.
//!
//! This crate ties the registry, the persistence codec and the container driver
//! together into the `Engine`: the API for creating, destroying, updating and
//! configuring containers and for installing packages and archives inside them.
//! Every multi-step operation follows the same discipline: validate, record an
//! in-progress status and save, call the driver, then record the terminal
//! status or roll back and save again. It also provides the integrity fix-up
//! pass, bind-mount policy, the advisory store lock and user configuration.

pub mod concurrency;
pub mod config;
pub mod engine;
pub mod integrity;
pub mod lifecycle;
pub mod mounts;

pub use concurrency::StoreLock;
pub use config::CairnConfig;
pub use engine::{CreateRequest, Engine, MountOutcome};
pub use integrity::IntegrityReport;
pub use lifecycle::{validate_container_transition, validate_item_transition};
pub use mounts::MountPolicy;

use cairn_runtime::RuntimeError;
use cairn_schema::SchemaError;
use cairn_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("container '{container}' is not ready (status: {status})")]
    NotReady { container: String, status: String },
    #[error("{0}")]
    AlreadyInState(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("distro '{0}' is not a valid release for this host (use --force to override)")]
    InvalidDistro(String),
    #[error("failed to {operation} in container '{container}': {detail}")]
    Backend {
        container: String,
        operation: String,
        detail: String,
    },
    #[error("failed to {operation} in container '{container}': {}", format_failed(.failed))]
    BatchFailed {
        container: String,
        operation: String,
        failed: Vec<(String, String)>,
    },
    #[error("store lock failed: {0}")]
    Lock(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_failed(failed: &[(String, String)]) -> String {
    failed
        .iter()
        .map(|(item, reason)| format!("{item} ({reason})"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Coarse error classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidFormat,
    AlreadyInState,
    BackendFailure,
    ParseError,
    NoDefaultContainer,
    NoContainers,
    InvalidTransition,
    Unsupported,
    ConfirmationRequired,
    BatchFailed,
    VersionMismatch,
    LockFailed,
    Io,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Store(e) => store_error_kind(e),
            CoreError::Schema(_) | CoreError::InvalidDistro(_) => ErrorKind::InvalidFormat,
            CoreError::Runtime(_) | CoreError::Backend { .. } => ErrorKind::BackendFailure,
            CoreError::InvalidTransition { .. } | CoreError::NotReady { .. } => {
                ErrorKind::InvalidTransition
            }
            CoreError::AlreadyInState(_) => ErrorKind::AlreadyInState,
            CoreError::Unsupported(_) => ErrorKind::Unsupported,
            CoreError::BatchFailed { .. } => ErrorKind::BatchFailed,
            CoreError::Lock(_) => ErrorKind::LockFailed,
            CoreError::Config(_) => ErrorKind::ParseError,
            CoreError::Io(_) => ErrorKind::Io,
        }
    }
}

fn store_error_kind(e: &StoreError) -> ErrorKind {
    if e.is_not_found() {
        return ErrorKind::NotFound;
    }
    if e.is_already_exists() {
        return ErrorKind::AlreadyExists;
    }
    match e {
        StoreError::Parse { .. } | StoreError::Corrupt(_) => ErrorKind::ParseError,
        StoreError::VersionMismatch { .. } => ErrorKind::VersionMismatch,
        StoreError::Schema(_) => ErrorKind::InvalidFormat,
        StoreError::NoDefaultContainer => ErrorKind::NoDefaultContainer,
        StoreError::NoContainers => ErrorKind::NoContainers,
        StoreError::ConfirmationRequired(_) => ErrorKind::ConfirmationRequired,
        _ => ErrorKind::Io,
    }
}

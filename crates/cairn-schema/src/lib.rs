//! Identifiers, status enums, and input validation for Cairn.
//!
//! This crate defines the vocabulary shared by every other layer: the
//! `ContainerId` newtype and its format rule, the closed status enums for
//! containers and their nested packages/archives, the container backend type,
//! and logical normalization of bind-mount paths.

pub mod paths;
pub mod status;
pub mod types;

pub use paths::normalize_absolute_path;
pub use status::{ContainerStatus, ContainerType, ItemStatus, MultiarchSupport};
pub use types::{validate_container_id, ContainerId};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("invalid container id '{0}': must match [a-z0-9][a-z0-9+.-]+")]
    InvalidContainerId(String),
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("unknown container type '{0}': expected lxc, lxd, or chroot")]
    UnknownContainerType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_display_names_the_input() {
        let e = SchemaError::InvalidContainerId("Bad Id".to_owned());
        assert!(e.to_string().contains("Bad Id"));

        let e = SchemaError::InvalidPath {
            path: "relative/dir".to_owned(),
            reason: "must be absolute".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("relative/dir"));
        assert!(msg.contains("must be absolute"));
    }
}

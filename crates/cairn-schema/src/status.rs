use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Install status of a container record.
///
/// `Removed` is a transient marker: a record carrying it is deleted before the
/// registry is next saved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Installing,
    Ready,
    Removing,
    Removed,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerStatus::Installing => write!(f, "installing"),
            ContainerStatus::Ready => write!(f, "ready"),
            ContainerStatus::Removing => write!(f, "removing"),
            ContainerStatus::Removed => write!(f, "removed"),
        }
    }
}

/// Install status of a package or archive record nested in a container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Installing,
    Installed,
    Removing,
    Removed,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemStatus::Installing => write!(f, "installing"),
            ItemStatus::Installed => write!(f, "installed"),
            ItemStatus::Removing => write!(f, "removing"),
            ItemStatus::Removed => write!(f, "removed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    Lxc,
    Lxd,
    Chroot,
}

impl ContainerType {
    /// Whether the backend keeps a running instance that can be frozen or restarted.
    pub fn is_persistent(self) -> bool {
        matches!(self, ContainerType::Lxc | ContainerType::Lxd)
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerType::Lxc => write!(f, "lxc"),
            ContainerType::Lxd => write!(f, "lxd"),
            ContainerType::Chroot => write!(f, "chroot"),
        }
    }
}

impl FromStr for ContainerType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lxc" => Ok(ContainerType::Lxc),
            "lxd" => Ok(ContainerType::Lxd),
            "chroot" => Ok(ContainerType::Chroot),
            _ => Err(SchemaError::UnknownContainerType(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MultiarchSupport {
    Enabled,
    #[default]
    Disabled,
}

impl MultiarchSupport {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            MultiarchSupport::Enabled
        } else {
            MultiarchSupport::Disabled
        }
    }

    pub fn is_enabled(self) -> bool {
        self == MultiarchSupport::Enabled
    }
}

impl fmt::Display for MultiarchSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultiarchSupport::Enabled => write!(f, "enabled"),
            MultiarchSupport::Disabled => write!(f, "disabled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&ContainerStatus::Ready).unwrap(),
            "\"ready\""
        );
        assert_eq!(
            serde_json::to_string(&ItemStatus::Installed).unwrap(),
            "\"installed\""
        );
        assert_eq!(
            serde_json::to_string(&MultiarchSupport::Enabled).unwrap(),
            "\"enabled\""
        );
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(serde_json::from_str::<ContainerStatus>("\"updating\"").is_err());
        assert!(serde_json::from_str::<ItemStatus>("\"broken\"").is_err());
    }

    #[test]
    fn display_matches_serde() {
        for s in [
            ContainerStatus::Installing,
            ContainerStatus::Ready,
            ContainerStatus::Removing,
            ContainerStatus::Removed,
        ] {
            assert_eq!(serde_json::to_string(&s).unwrap(), format!("\"{s}\""));
        }
        for s in [
            ItemStatus::Installing,
            ItemStatus::Installed,
            ItemStatus::Removing,
            ItemStatus::Removed,
        ] {
            assert_eq!(serde_json::to_string(&s).unwrap(), format!("\"{s}\""));
        }
    }

    #[test]
    fn container_type_parse() {
        assert_eq!("LXD".parse::<ContainerType>().unwrap(), ContainerType::Lxd);
        assert_eq!(
            "chroot".parse::<ContainerType>().unwrap(),
            ContainerType::Chroot
        );
        assert!("docker".parse::<ContainerType>().is_err());
    }

    #[test]
    fn only_lxc_and_lxd_are_persistent() {
        assert!(ContainerType::Lxc.is_persistent());
        assert!(ContainerType::Lxd.is_persistent());
        assert!(!ContainerType::Chroot.is_persistent());
    }

    #[test]
    fn multiarch_default_is_disabled() {
        assert_eq!(MultiarchSupport::default(), MultiarchSupport::Disabled);
        assert!(MultiarchSupport::from_enabled(true).is_enabled());
    }
}

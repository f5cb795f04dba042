use crate::prereq::{check_lxc_prereqs, check_lxd_prereqs};
use std::ffi::OsString;
use std::path::PathBuf;

/// Ubuntu release codenames accepted without `--force`.
pub const SUPPORTED_RELEASES: &[&str] = &["xenial", "bionic", "focal", "jammy", "noble"];

/// Facts about the host the orchestrator validates requests against.
pub trait HostInfo: Send + Sync {
    /// Debian-style architecture name (`amd64`, `arm64`, `armhf`, ...).
    fn architecture(&self) -> String;

    fn distro_release(&self) -> String;

    fn locale(&self) -> String;

    fn has_lxc_support(&self) -> bool;

    fn has_lxd_support(&self) -> bool;

    fn is_distro_valid(&self, name: &str, force: bool) -> bool;

    /// The invoking user's home directory, if the environment names one.
    fn home_dir(&self) -> Option<PathBuf>;

    fn user_name(&self) -> String;

    fn is_64bit(&self) -> bool {
        matches!(
            self.architecture().as_str(),
            "amd64" | "arm64" | "ppc64el" | "s390x" | "riscv64"
        )
    }
}

/// Probes the running system.
#[derive(Debug, Default, Clone)]
pub struct SystemHost;

impl SystemHost {
    pub fn new() -> Self {
        Self
    }
}

fn debian_arch(rust_arch: &str) -> String {
    match rust_arch {
        "x86_64" => "amd64",
        "x86" => "i386",
        "aarch64" => "arm64",
        "arm" => "armhf",
        "powerpc64" => "ppc64el",
        other => other,
    }
    .to_owned()
}

/// Extract the release codename from an os-release document.
fn parse_os_release_codename(content: &str) -> Option<String> {
    let mut codename = None;
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').to_owned();
        match key.trim() {
            "UBUNTU_CODENAME" if !value.is_empty() => return Some(value),
            "VERSION_CODENAME" if !value.is_empty() => codename = Some(value),
            _ => {}
        }
    }
    codename
}

fn home_from(value: Option<OsString>) -> Option<PathBuf> {
    value.filter(|v| !v.is_empty()).map(PathBuf::from)
}

impl HostInfo for SystemHost {
    fn architecture(&self) -> String {
        debian_arch(std::env::consts::ARCH)
    }

    fn distro_release(&self) -> String {
        std::fs::read_to_string("/etc/os-release")
            .ok()
            .and_then(|c| parse_os_release_codename(&c))
            .unwrap_or_default()
    }

    fn locale(&self) -> String {
        ["LC_ALL", "LANG"]
            .iter()
            .filter_map(|k| std::env::var(k).ok())
            .find(|v| !v.is_empty())
            .unwrap_or_else(|| "C.UTF-8".to_owned())
    }

    fn has_lxc_support(&self) -> bool {
        check_lxc_prereqs().is_empty()
    }

    fn has_lxd_support(&self) -> bool {
        check_lxd_prereqs().is_empty()
    }

    fn is_distro_valid(&self, name: &str, force: bool) -> bool {
        force || SUPPORTED_RELEASES.contains(&name)
    }

    fn home_dir(&self) -> Option<PathBuf> {
        home_from(std::env::var_os("HOME"))
    }

    fn user_name(&self) -> String {
        ["USER", "LOGNAME"]
            .iter()
            .filter_map(|k| std::env::var(k).ok())
            .find(|v| !v.is_empty())
            .unwrap_or_else(|| "root".to_owned())
    }
}

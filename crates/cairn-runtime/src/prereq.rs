use std::fmt;
use std::process::Command;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: &'static str,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

pub(crate) fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn require(
    missing: &mut Vec<MissingPrereq>,
    name: &'static str,
    purpose: &'static str,
    install_hint: &'static str,
) {
    if !command_exists(name) {
        missing.push(MissingPrereq {
            name,
            purpose,
            install_hint,
        });
    }
}

/// Check the tools the LXC backend shells out to.
/// Returns a list of missing items. Empty list means all prerequisites are met.
pub fn check_lxc_prereqs() -> Vec<MissingPrereq> {
    let mut missing = Vec::new();
    for name in ["lxc-create", "lxc-attach", "lxc-destroy", "lxc-start", "lxc-stop"] {
        require(
            &mut missing,
            name,
            "LXC container management",
            "apt install lxc",
        );
    }
    missing
}

/// Check the LXD client.
pub fn check_lxd_prereqs() -> Vec<MissingPrereq> {
    let mut missing = Vec::new();
    require(
        &mut missing,
        "lxc",
        "LXD client for container management",
        "snap install lxd",
    );
    missing
}

/// Check the tools needed to bootstrap and enter an unprivileged chroot.
pub fn check_chroot_prereqs() -> Vec<MissingPrereq> {
    let mut missing = Vec::new();
    require(
        &mut missing,
        "debootstrap",
        "bootstrapping the container root filesystem",
        "apt install debootstrap",
    );
    require(
        &mut missing,
        "fakechroot",
        "unprivileged chroot",
        "apt install fakechroot",
    );
    require(
        &mut missing,
        "fakeroot",
        "unprivileged package installation",
        "apt install fakeroot",
    );
    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nCairn needs these tools to manage containers of this type.");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prereq_display() {
        let m = MissingPrereq {
            name: "debootstrap",
            purpose: "bootstrapping",
            install_hint: "apt install debootstrap",
        };
        let s = format!("{m}");
        assert!(s.contains("debootstrap"));
        assert!(s.contains("bootstrapping"));
        assert!(s.contains("apt install debootstrap"));
    }

    #[test]
    fn format_missing_produces_readable_output() {
        let items = vec![
            MissingPrereq {
                name: "lxc-create",
                purpose: "lxc",
                install_hint: "apt install lxc",
            },
            MissingPrereq {
                name: "fakechroot",
                purpose: "chroot",
                install_hint: "apt install fakechroot",
            },
        ];
        let output = format_missing(&items);
        assert!(output.contains("missing prerequisites:"));
        assert!(output.contains("lxc-create"));
        assert!(output.contains("fakechroot"));
    }

    #[test]
    fn nonexistent_command_is_missing() {
        assert!(!command_exists("cairn-definitely-not-a-real-binary"));
    }
}

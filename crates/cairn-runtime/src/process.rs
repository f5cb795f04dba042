use crate::driver::{shell_quote, ContainerDriver, ContainerSpec};
use crate::RuntimeError;
use cairn_schema::ContainerType;
use std::process::{Command, Stdio};
use tracing::debug;

/// Drives containers by spawning the LXC, LXD and chroot command-line tools.
#[derive(Debug, Default, Clone)]
pub struct ProcessDriver;

impl ProcessDriver {
    pub fn new() -> Self {
        Self
    }
}

fn argv<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| (*s).to_owned()).collect()
}

/// Command line that runs `command` through `/bin/sh` inside the container.
pub(crate) fn exec_argv(spec: &ContainerSpec, command: &str) -> Vec<String> {
    match spec.kind {
        ContainerType::Lxc => argv([
            "lxc-attach",
            "-n",
            spec.id.as_str(),
            "--",
            "/bin/sh",
            "-c",
            command,
        ]),
        ContainerType::Lxd => argv(["lxc", "exec", spec.id.as_str(), "--", "/bin/sh", "-c", command]),
        ContainerType::Chroot => {
            let root = spec.root_path.to_string_lossy();
            argv([
                "fakechroot",
                "fakeroot",
                "chroot",
                root.as_ref(),
                "/bin/sh",
                "-c",
                command,
            ])
        }
    }
}

pub(crate) fn create_argv(spec: &ContainerSpec) -> Vec<String> {
    match spec.kind {
        ContainerType::Lxc => argv([
            "lxc-create",
            "-n",
            spec.id.as_str(),
            "-t",
            "download",
            "--",
            "-d",
            "ubuntu",
            "-r",
            spec.distro.as_str(),
            "-a",
            spec.architecture.as_str(),
        ]),
        ContainerType::Lxd => {
            let image = format!("ubuntu:{}", spec.distro);
            argv(["lxc", "launch", image.as_str(), spec.id.as_str()])
        }
        ContainerType::Chroot => {
            let root = spec.root_path.to_string_lossy();
            argv([
                "fakechroot",
                "fakeroot",
                "debootstrap",
                "--variant=fakechroot",
                spec.distro.as_str(),
                root.as_ref(),
            ])
        }
    }
}

pub(crate) fn lxc_mount_entry(path: &str) -> String {
    format!(
        "lxc.mount.entry = {path} {} none bind,create=dir 0 0",
        path.trim_start_matches('/')
    )
}

/// apt-get invocation for installing or purging one package.
pub(crate) fn apt_command(verb: &str, package: &str, interactive: bool) -> String {
    if interactive {
        format!("apt-get {verb} {}", shell_quote(package))
    } else {
        format!(
            "DEBIAN_FRONTEND=noninteractive apt-get {verb} -y {}",
            shell_quote(package)
        )
    }
}

fn run(args: &[String], interactive: bool) -> Result<i32, RuntimeError> {
    let Some((program, rest)) = args.split_first() else {
        return Err(RuntimeError::ExecFailed("empty command line".to_owned()));
    };
    debug!("running {}", args.join(" "));
    let mut cmd = Command::new(program);
    cmd.args(rest);
    if !interactive {
        cmd.stdin(Stdio::null());
    }
    let status = cmd
        .status()
        .map_err(|e| RuntimeError::ExecFailed(format!("{program}: {e}")))?;
    Ok(status.code().unwrap_or(1))
}

fn run_checked(args: &[String], interactive: bool) -> Result<(), RuntimeError> {
    let code = run(args, interactive)?;
    if code == 0 {
        Ok(())
    } else {
        Err(RuntimeError::CommandFailed {
            command: args.join(" "),
            detail: format!("exit code {code}"),
        })
    }
}

impl ProcessDriver {
    fn exec_inner(
        spec: &ContainerSpec,
        command: &str,
        interactive: bool,
    ) -> Result<(), RuntimeError> {
        run_checked(&exec_argv(spec, command), interactive)
    }

    fn start_args(spec: &ContainerSpec) -> Vec<String> {
        let mut args = argv(["lxc-start", "-n", spec.id.as_str(), "-d"]);
        for mount in &spec.bind_mounts {
            args.push("-s".to_owned());
            args.push(lxc_mount_entry(mount));
        }
        args
    }
}

impl ContainerDriver for ProcessDriver {
    fn name(&self) -> &str {
        "process"
    }

    fn create(&self, spec: &ContainerSpec, password: Option<&str>) -> Result<(), RuntimeError> {
        if spec.kind == ContainerType::Chroot {
            if let Some(parent) = spec.root_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        run_checked(&create_argv(spec), false)?;
        if spec.kind == ContainerType::Lxc {
            run_checked(&Self::start_args(spec), false)?;
        }
        if spec.multiarch {
            Self::exec_inner(spec, "dpkg --add-architecture i386", false)?;
        }
        if let Some(locale) = &spec.locale {
            Self::exec_inner(
                spec,
                &format!("locale-gen {}", shell_quote(locale)),
                false,
            )?;
        }
        if let Some(password) = password {
            let credentials = format!("{}:{password}", spec.user);
            Self::exec_inner(
                spec,
                &format!(
                    "id -u {user} >/dev/null 2>&1 || useradd -m {user}; echo {} | chpasswd",
                    shell_quote(&credentials),
                    user = shell_quote(&spec.user)
                ),
                false,
            )?;
        }
        Self::exec_inner(spec, "apt-get update", false)
    }

    fn destroy(&self, spec: &ContainerSpec, force: bool) -> Result<(), RuntimeError> {
        match spec.kind {
            ContainerType::Lxc => {
                let mut args = argv(["lxc-destroy", "-n", spec.id.as_str()]);
                if force {
                    args.push("-f".to_owned());
                }
                run_checked(&args, false)
            }
            ContainerType::Lxd => {
                let mut args = argv(["lxc", "delete", spec.id.as_str()]);
                if force {
                    args.push("--force".to_owned());
                }
                run_checked(&args, false)
            }
            ContainerType::Chroot => match std::fs::remove_dir_all(&spec.root_path) {
                Err(e) if force && e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other.map_err(RuntimeError::from),
            },
        }
    }

    fn exec(&self, spec: &ContainerSpec, command: &str) -> Result<(), RuntimeError> {
        Self::exec_inner(spec, command, true)
    }

    fn install_package(
        &self,
        spec: &ContainerSpec,
        package: &str,
        interactive: bool,
        update_cache: bool,
    ) -> Result<(), RuntimeError> {
        if update_cache {
            Self::exec_inner(spec, "apt-get update", interactive)?;
        }
        Self::exec_inner(spec, &apt_command("install", package, interactive), interactive)
    }

    fn remove_package(
        &self,
        spec: &ContainerSpec,
        package: &str,
        interactive: bool,
    ) -> Result<(), RuntimeError> {
        Self::exec_inner(
            spec,
            &apt_command("purge --auto-remove", package, interactive),
            interactive,
        )
    }

    fn restart(&self, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        match spec.kind {
            ContainerType::Lxc => {
                // lxc-stop fails on an already stopped container; start decides.
                let _ = run(&argv(["lxc-stop", "-n", spec.id.as_str()]), false);
                run_checked(&Self::start_args(spec), false)
            }
            ContainerType::Lxd => run_checked(&argv(["lxc", "restart", spec.id.as_str()]), false),
            ContainerType::Chroot => Ok(()),
        }
    }

    fn binary_exists(&self, spec: &ContainerSpec, name: &str) -> bool {
        let command = format!("command -v {} >/dev/null 2>&1", shell_quote(name));
        run(&exec_argv(spec, &command), false).is_ok_and(|code| code == 0)
    }

    fn search_cache(&self, spec: &ContainerSpec, query: &str) -> Result<i32, RuntimeError> {
        run(
            &exec_argv(spec, &format!("apt-cache search {}", shell_quote(query))),
            true,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_schema::ContainerId;
    use std::path::PathBuf;

    fn spec(kind: ContainerType) -> ContainerSpec {
        ContainerSpec {
            id: ContainerId::new("work"),
            kind,
            distro: "jammy".to_owned(),
            architecture: "amd64".to_owned(),
            root_path: PathBuf::from("/store/containers/work/rootfs"),
            multiarch: false,
            locale: None,
            user: "tester".to_owned(),
            bind_mounts: vec!["/home/tester/Music".to_owned()],
        }
    }

    #[test]
    fn exec_argv_per_type() {
        assert_eq!(
            exec_argv(&spec(ContainerType::Lxc), "true"),
            vec!["lxc-attach", "-n", "work", "--", "/bin/sh", "-c", "true"]
        );
        assert_eq!(
            exec_argv(&spec(ContainerType::Lxd), "true"),
            vec!["lxc", "exec", "work", "--", "/bin/sh", "-c", "true"]
        );
        let chroot = exec_argv(&spec(ContainerType::Chroot), "true");
        assert_eq!(chroot[..3], ["fakechroot", "fakeroot", "chroot"]);
        assert_eq!(chroot[3], "/store/containers/work/rootfs");
    }

    #[test]
    fn create_argv_per_type() {
        let lxc = create_argv(&spec(ContainerType::Lxc));
        assert_eq!(lxc[0], "lxc-create");
        assert!(lxc.windows(2).any(|w| w == ["-r", "jammy"]));
        assert!(lxc.windows(2).any(|w| w == ["-a", "amd64"]));

        assert_eq!(
            create_argv(&spec(ContainerType::Lxd)),
            vec!["lxc", "launch", "ubuntu:jammy", "work"]
        );

        let chroot = create_argv(&spec(ContainerType::Chroot));
        assert!(chroot.contains(&"debootstrap".to_owned()));
        assert_eq!(chroot.last().unwrap(), "/store/containers/work/rootfs");
    }

    #[test]
    fn start_args_carry_bind_mounts() {
        let args = ProcessDriver::start_args(&spec(ContainerType::Lxc));
        assert_eq!(args[..4], ["lxc-start", "-n", "work", "-d"]);
        assert_eq!(
            args[5],
            "lxc.mount.entry = /home/tester/Music home/tester/Music none bind,create=dir 0 0"
        );
    }

    #[test]
    fn apt_command_quotes_package() {
        assert_eq!(
            apt_command("install", "vim", false),
            "DEBIAN_FRONTEND=noninteractive apt-get install -y 'vim'"
        );
        assert_eq!(apt_command("install", "vim", true), "apt-get install 'vim'");
    }

    #[test]
    fn chroot_restart_is_noop() {
        assert!(ProcessDriver::new()
            .restart(&spec(ContainerType::Chroot))
            .is_ok());
    }

    #[test]
    fn forced_chroot_destroy_tolerates_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = spec(ContainerType::Chroot);
        s.root_path = dir.path().join("absent");
        let driver = ProcessDriver::new();
        assert!(driver.destroy(&s, true).is_ok());
        assert!(driver.destroy(&s, false).is_err());
    }

    #[test]
    fn chroot_destroy_removes_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = spec(ContainerType::Chroot);
        s.root_path = dir.path().join("rootfs");
        std::fs::create_dir_all(s.root_path.join("etc")).unwrap();
        ProcessDriver::new().destroy(&s, false).unwrap();
        assert!(!s.root_path.exists());
    }
}

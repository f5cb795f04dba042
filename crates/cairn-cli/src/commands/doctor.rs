use super::{EXIT_FAILURE, EXIT_SUCCESS};
use cairn_core::{Engine, StoreLock};
use cairn_schema::{ContainerStatus, ItemStatus};

pub fn run(engine: &Engine, json_output: bool) -> Result<u8, String> {
    let mut checks: Vec<Check> = Vec::new();
    let mut all_pass = true;

    check_backends(engine, &mut checks, &mut all_pass);
    check_store(engine, &mut checks, &mut all_pass);

    print_results(&checks, all_pass, json_output)
}

fn check_backends(engine: &Engine, checks: &mut Vec<Check>, all_pass: &mut bool) {
    let backends = [
        ("lxd", cairn_runtime::check_lxd_prereqs()),
        ("lxc", cairn_runtime::check_lxc_prereqs()),
        ("chroot", cairn_runtime::check_chroot_prereqs()),
    ];
    let mut usable = 0;
    for (name, missing) in &backends {
        let check_name = format!("{name}_prereqs");
        if missing.is_empty() {
            usable += 1;
            checks.push(Check::pass(&check_name, &format!("{name} tools found")));
        } else {
            checks.push(Check::info(
                &check_name,
                &format!(
                    "{name} unavailable, missing: {}",
                    cairn_runtime::format_missing(missing)
                ),
            ));
        }
    }
    if usable == 0 {
        *all_pass = false;
        checks.push(Check::fail(
            "backends",
            "No container backend is installed",
        ));
    }

    let host = engine.host();
    checks.push(Check::info(
        "host",
        &format!(
            "Host: {} on {}, locale {}",
            host.distro_release(),
            host.architecture(),
            host.locale()
        ),
    ));
}

fn check_store(engine: &Engine, checks: &mut Vec<Check>, all_pass: &mut bool) {
    let layout = engine.layout();
    if !layout.registry_file().exists() {
        checks.push(Check::info(
            "registry",
            "Registry not created yet (will be created on first change)",
        ));
        return;
    }

    match engine.load_registry() {
        Ok(registry) => {
            checks.push(Check::pass(
                "registry",
                &format!("Registry readable ({} containers)", registry.len()),
            ));
            let interrupted = registry
                .containers()
                .iter()
                .filter(|c| {
                    c.install_status != Some(ContainerStatus::Ready)
                        || c.installed_apps
                            .iter()
                            .any(|p| p.app_status != ItemStatus::Installed)
                        || c.extra_archives
                            .iter()
                            .any(|a| a.archive_status != ItemStatus::Installed)
                })
                .count();
            if interrupted == 0 {
                checks.push(Check::pass(
                    "registry_consistent",
                    "No interrupted operations recorded",
                ));
            } else {
                checks.push(Check::warn(
                    "registry_consistent",
                    &format!(
                        "{interrupted} container(s) have interrupted operations (run `cairn fix-integrity`)"
                    ),
                ));
            }
        }
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail(
                "registry",
                &format!("Registry cannot be read: {e}"),
            ));
        }
    }

    match StoreLock::try_acquire(&layout.lock_file()) {
        Ok(Some(_)) => checks.push(Check::pass("store_lock", "Store lock is free")),
        Ok(None) => checks.push(Check::warn(
            "store_lock",
            "Store lock is held by another process",
        )),
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail(
                "store_lock",
                &format!("Cannot check store lock: {e}"),
            ));
        }
    }
}

fn print_results(checks: &[Check], all_pass: bool, json_output: bool) -> Result<u8, String> {
    if json_output {
        let json = serde_json::json!({
            "healthy": all_pass,
            "checks": checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "status": c.status,
                "message": c.message,
            })).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?
        );
    } else {
        println!("Cairn Doctor\n");
        for check in checks {
            let icon = match check.status {
                "pass" => "✓",
                "fail" => "✗",
                "warn" => "⚠",
                _ => "ℹ",
            };
            println!("  {icon} {}", check.message);
        }
        println!();
        if all_pass {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }
    Ok(if all_pass { EXIT_SUCCESS } else { EXIT_FAILURE })
}

struct Check {
    name: String,
    status: &'static str,
    message: String,
}

impl Check {
    fn new(name: &str, status: &'static str, message: &str) -> Self {
        Self {
            name: name.to_owned(),
            status,
            message: message.to_owned(),
        }
    }

    fn pass(name: &str, message: &str) -> Self {
        Self::new(name, "pass", message)
    }

    fn fail(name: &str, message: &str) -> Self {
        Self::new(name, "fail", message)
    }

    fn warn(name: &str, message: &str) -> Self {
        Self::new(name, "warn", message)
    }

    fn info(name: &str, message: &str) -> Self {
        Self::new(name, "info", message)
    }
}

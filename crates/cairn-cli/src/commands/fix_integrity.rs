use super::{json_pretty, with_registry, with_spinner, EXIT_SUCCESS};
use cairn_core::Engine;

pub fn run(engine: &Engine, json: bool) -> Result<u8, String> {
    let report = with_spinner(json, "checking registry...", "registry checked", || {
        with_registry(engine, |reg| engine.fix_integrity(reg))
    })?;

    if json {
        println!("{}", json_pretty(&report)?);
        return Ok(EXIT_SUCCESS);
    }

    if report.is_clean() {
        println!("registry is consistent");
    }
    for id in &report.destroyed_containers {
        println!("destroyed interrupted container '{id}'");
    }
    for (id, package) in &report.removed_packages {
        println!("removed interrupted package '{package}' from '{id}'");
    }
    for (id, archive) in &report.dropped_archives {
        println!("dropped interrupted archive '{archive}' from '{id}'");
    }
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(EXIT_SUCCESS)
}

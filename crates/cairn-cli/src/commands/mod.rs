pub mod completions;
pub mod configure;
pub mod create;
pub mod default;
pub mod destroy;
pub mod doctor;
pub mod exec;
pub mod fix_integrity;
pub mod list;
pub mod merge;
pub mod packages;
pub mod rename;
pub mod restart;
pub mod search_cache;
pub mod update;

use cairn_core::{CoreError, Engine, ErrorKind, StoreLock};
use cairn_store::Registry;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;
pub const EXIT_STORE_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

/// Render an engine error with the prefix `main` maps to an exit code.
pub fn describe(e: &CoreError) -> String {
    match e.kind() {
        ErrorKind::ParseError | ErrorKind::VersionMismatch | ErrorKind::Io => {
            format!("store error: {e}")
        }
        ErrorKind::LockFailed => format!("store lock: {e}"),
        ErrorKind::NotFound
        | ErrorKind::AlreadyExists
        | ErrorKind::InvalidFormat
        | ErrorKind::AlreadyInState
        | ErrorKind::NoDefaultContainer
        | ErrorKind::NoContainers
        | ErrorKind::InvalidTransition
        | ErrorKind::Unsupported
        | ErrorKind::ConfirmationRequired => format!("invalid request: {e}"),
        ErrorKind::BackendFailure | ErrorKind::BatchFailed => e.to_string(),
    }
}

pub fn read_registry(engine: &Engine) -> Result<Registry, String> {
    engine.load_registry().map_err(|e| describe(&e))
}

/// Run `op` against the registry while holding the store lock.
pub fn with_registry<T>(
    engine: &Engine,
    op: impl FnOnce(&mut Registry) -> Result<T, CoreError>,
) -> Result<T, String> {
    let _lock =
        StoreLock::acquire(&engine.layout().lock_file()).map_err(|e| format!("store lock: {e}"))?;
    let mut registry = read_registry(engine)?;
    op(&mut registry).map_err(|e| describe(&e))
}

fn spinner_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        spinner_style("{spinner:.cyan} {msg}")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(spinner_style("{msg}"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(spinner_style("{msg}"));
    pb.finish_with_message(format!("✗ {msg}"));
}

/// Run a long operation behind a spinner unless JSON output was requested.
pub fn with_spinner<T>(
    json: bool,
    msg: &str,
    done: &str,
    op: impl FnOnce() -> Result<T, String>,
) -> Result<T, String> {
    let pb = (!json).then(|| spinner(msg));
    let result = op();
    if let Some(pb) = &pb {
        match &result {
            Ok(_) => spin_ok(pb, done),
            Err(_) => spin_fail(pb, &format!("{msg} failed")),
        }
    }
    result
}

pub fn colorize_status(status: &str) -> String {
    use console::Style;
    match status {
        "ready" | "installed" => Style::new().green().apply_to(status).to_string(),
        "installing" => Style::new().cyan().apply_to(status).to_string(),
        "removing" => Style::new().yellow().apply_to(status).to_string(),
        "unknown" => Style::new().red().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_store::StoreError;

    #[test]
    fn json_pretty_serializes_string() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn colorize_status_keeps_text() {
        for status in ["ready", "installed", "installing", "removing", "unknown"] {
            assert!(colorize_status(status).contains(status));
        }
        assert_eq!(colorize_status("other"), "other");
    }

    #[test]
    fn describe_prefixes_by_kind() {
        let e = CoreError::from(StoreError::NoDefaultContainer);
        assert!(describe(&e).starts_with("invalid request:"));
        let e = CoreError::from(StoreError::VersionMismatch {
            expected: 1,
            found: 2,
        });
        assert!(describe(&e).starts_with("store error:"));
        let e = CoreError::Lock("held".to_owned());
        assert!(describe(&e).starts_with("store lock:"));
        let e = CoreError::Backend {
            container: "work".to_owned(),
            operation: "restart container".to_owned(),
            detail: "exit code 1".to_owned(),
        };
        assert!(describe(&e).starts_with("failed to restart container"));
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_USAGE_ERROR);
        assert_ne!(EXIT_USAGE_ERROR, EXIT_STORE_ERROR);
    }

    #[test]
    fn spinner_finishes() {
        let pb = spinner("testing...");
        spin_ok(&pb, "done");
        let pb = spinner("testing...");
        spin_fail(&pb, "failed");
    }

    #[test]
    fn with_spinner_passes_result_through() {
        assert_eq!(with_spinner(true, "working", "done", || Ok(3)).unwrap(), 3);
        assert!(with_spinner::<()>(true, "working", "done", || Err("x".to_owned())).is_err());
    }
}

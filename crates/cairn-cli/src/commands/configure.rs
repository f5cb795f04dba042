use super::{describe, json_pretty, with_registry, with_spinner, EXIT_SUCCESS};
use crate::AddRemove;
use cairn_core::{CoreError, Engine, MountOutcome};
use cairn_store::Registry;
use serde::Serialize;

pub struct ConfigureArgs {
    pub archive: Option<(AddRemove, String)>,
    pub bind_mount: Option<(AddRemove, String)>,
    pub multiarch: Option<bool>,
    pub freeze: Option<bool>,
}

impl ConfigureArgs {
    fn is_empty(&self) -> bool {
        self.archive.is_none()
            && self.bind_mount.is_none()
            && self.multiarch.is_none()
            && self.freeze.is_none()
    }
}

#[derive(Debug, Default, Serialize)]
struct Applied {
    id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    changes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bind_mount: Option<MountOutcome>,
    /// Set when a later setting failed after earlier ones were already saved.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Apply each requested setting in a fixed order, stopping at the first error.
///
/// Settings applied before the error stay saved and are still reported.
pub fn run(
    engine: &Engine,
    id: Option<&str>,
    args: &ConfigureArgs,
    json: bool,
) -> Result<u8, String> {
    if args.is_empty() {
        return Err(
            "invalid request: nothing to configure (see `cairn configure --help`)".to_owned(),
        );
    }

    let applied = with_spinner(json, "configuring container...", "container configured", || {
        with_registry(engine, |reg| apply(engine, reg, id, args))
    })?;

    if json {
        println!("{}", json_pretty(&applied)?);
    } else {
        for change in &applied.changes {
            println!("{}: {change}", applied.id);
        }
        if let Some(mount) = &applied.bind_mount {
            if mount.restarted {
                println!("{}: restarted to apply bind mount changes", applied.id);
            }
            if let Some(warning) = &mount.warning {
                eprintln!("warning: {warning}");
            }
        }
    }

    match applied.error {
        Some(err) => Err(format!(
            "configure stopped after {} change(s) were saved: {err}",
            applied.changes.len()
        )),
        None => Ok(EXIT_SUCCESS),
    }
}

fn apply(
    engine: &Engine,
    reg: &mut Registry,
    id: Option<&str>,
    args: &ConfigureArgs,
) -> Result<Applied, CoreError> {
    let id = reg.check_container_id(id)?;
    let mut applied = Applied {
        id: id.to_string(),
        ..Applied::default()
    };

    if let Err(e) = apply_each(engine, reg, &id, args, &mut applied) {
        if applied.changes.is_empty() {
            return Err(e);
        }
        applied.error = Some(describe(&e));
    }
    Ok(applied)
}

fn apply_each(
    engine: &Engine,
    reg: &mut Registry,
    id: &str,
    args: &ConfigureArgs,
    applied: &mut Applied,
) -> Result<(), CoreError> {
    if let Some((op, archive)) = &args.archive {
        match op {
            AddRemove::Add => {
                engine.add_archive(reg, id, archive)?;
                applied.changes.push(format!("added archive '{archive}'"));
            }
            AddRemove::Remove => {
                engine.remove_archive(reg, id, archive)?;
                applied.changes.push(format!("removed archive '{archive}'"));
            }
        }
    }

    if let Some(enabled) = args.multiarch {
        engine.set_multiarch(reg, id, enabled)?;
        let state = if enabled { "enabled" } else { "disabled" };
        applied.changes.push(format!("multiarch {state}"));
    }

    if let Some(freeze) = args.freeze {
        engine.set_freeze_on_stop(reg, id, freeze)?;
        let state = if freeze { "on" } else { "off" };
        applied.changes.push(format!("freeze on stop {state}"));
    }

    if let Some((op, path)) = &args.bind_mount {
        let outcome = match op {
            AddRemove::Add => engine.add_bind_mount(reg, id, path)?,
            AddRemove::Remove => engine.remove_bind_mount(reg, id, path)?,
        };
        let verb = match op {
            AddRemove::Add => "added",
            AddRemove::Remove => "removed",
        };
        applied
            .changes
            .push(format!("{verb} bind mount '{}'", outcome.path));
        applied.bind_mount = Some(outcome);
    }
    Ok(())
}

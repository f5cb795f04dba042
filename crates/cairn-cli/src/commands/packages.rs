use super::{json_pretty, with_registry, with_spinner, EXIT_SUCCESS};
use cairn_core::Engine;

pub fn install(
    engine: &Engine,
    id: Option<&str>,
    packages: &[String],
    interactive: bool,
    json: bool,
) -> Result<u8, String> {
    // An interactive package manager owns the terminal.
    let quiet = json || interactive;
    let id = with_spinner(quiet, "installing packages...", "packages installed", || {
        with_registry(engine, |reg| {
            let id = reg.check_container_id(id)?;
            engine.install_packages(reg, &id, packages, interactive)?;
            Ok(id)
        })
    })?;
    report(&id, "installed", packages, json)
}

pub fn remove(
    engine: &Engine,
    id: Option<&str>,
    packages: &[String],
    interactive: bool,
    json: bool,
) -> Result<u8, String> {
    let quiet = json || interactive;
    let id = with_spinner(quiet, "removing packages...", "packages removed", || {
        with_registry(engine, |reg| {
            let id = reg.check_container_id(id)?;
            engine.remove_packages(reg, &id, packages, interactive)?;
            Ok(id)
        })
    })?;
    report(&id, "removed", packages, json)
}

fn report(id: &str, verb: &str, packages: &[String], json: bool) -> Result<u8, String> {
    if json {
        let payload = serde_json::json!({ "id": id, (verb): packages });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("{verb} {} in '{id}'", packages.join(", "));
    }
    Ok(EXIT_SUCCESS)
}

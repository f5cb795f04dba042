use super::{json_pretty, with_registry, with_spinner, EXIT_SUCCESS};
use cairn_core::Engine;

pub fn run(engine: &Engine, id: Option<&str>, force: bool, json: bool) -> Result<u8, String> {
    let id = with_spinner(json, "destroying container...", "container destroyed", || {
        with_registry(engine, |reg| {
            let id = reg.check_container_id(id)?;
            engine.destroy_container(reg, &id, force)?;
            Ok(id)
        })
    })?;

    if json {
        println!(
            "{}",
            json_pretty(&serde_json::json!({ "id": id, "destroyed": true }))?
        );
    } else {
        println!("destroyed container '{id}'");
    }
    Ok(EXIT_SUCCESS)
}

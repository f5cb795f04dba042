use super::{json_pretty, with_registry, with_spinner, EXIT_SUCCESS};
use cairn_core::Engine;

pub fn run(engine: &Engine, id: Option<&str>, json: bool) -> Result<u8, String> {
    let id = with_spinner(json, "restarting container...", "container restarted", || {
        with_registry(engine, |reg| {
            let id = reg.check_container_id(id)?;
            engine.restart_container(reg, &id)?;
            Ok(id)
        })
    })?;

    if json {
        println!(
            "{}",
            json_pretty(&serde_json::json!({ "id": id, "restarted": true }))?
        );
    } else {
        println!("restarted container '{id}'");
    }
    Ok(EXIT_SUCCESS)
}

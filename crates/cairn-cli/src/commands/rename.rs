use super::{json_pretty, with_registry, EXIT_SUCCESS};
use cairn_core::Engine;

pub fn run(engine: &Engine, id: Option<&str>, name: &str, json: bool) -> Result<u8, String> {
    let id = with_registry(engine, |reg| {
        let id = reg.check_container_id(id)?;
        engine.rename_container(reg, &id, name)?;
        Ok(id)
    })?;

    if json {
        println!(
            "{}",
            json_pretty(&serde_json::json!({ "id": id, "name": name }))?
        );
    } else {
        println!("renamed '{id}' to '{name}'");
    }
    Ok(EXIT_SUCCESS)
}

use super::{json_pretty, read_registry, with_registry, EXIT_SUCCESS};
use cairn_core::Engine;

pub fn set(engine: &Engine, id: &str, json: bool) -> Result<u8, String> {
    with_registry(engine, |reg| engine.set_default(reg, id))?;
    if json {
        println!("{}", json_pretty(&serde_json::json!({ "default": id }))?);
    } else {
        println!("default container is now '{id}'");
    }
    Ok(EXIT_SUCCESS)
}

/// Without `--yes`, asks on the terminal; a prompt that cannot be shown counts as "no".
pub fn clear(engine: &Engine, yes: bool, json: bool) -> Result<u8, String> {
    let confirm = yes
        || (!json
            && dialoguer::Confirm::new()
                .with_prompt("Clear the default container?")
                .default(false)
                .interact()
                .unwrap_or(false));

    with_registry(engine, |reg| engine.clear_default(reg, confirm))?;
    if json {
        println!(
            "{}",
            json_pretty(&serde_json::json!({ "default": serde_json::Value::Null }))?
        );
    } else {
        println!("default container cleared");
    }
    Ok(EXIT_SUCCESS)
}

pub fn show(engine: &Engine, json: bool) -> Result<u8, String> {
    let registry = read_registry(engine)?;
    let default = registry.default_container();
    if json {
        println!("{}", json_pretty(&serde_json::json!({ "default": default }))?);
    } else {
        match default {
            Some(id) => println!("{id}"),
            None => println!("no default container"),
        }
    }
    Ok(EXIT_SUCCESS)
}

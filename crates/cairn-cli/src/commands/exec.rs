use super::{describe, read_registry, EXIT_SUCCESS};
use cairn_core::{CoreError, Engine};

pub fn run(engine: &Engine, id: Option<&str>, command: &[String]) -> Result<u8, String> {
    let registry = read_registry(engine)?;
    let id = registry
        .check_container_id(id)
        .map_err(|e| describe(&CoreError::from(e)))?;
    engine
        .exec(&registry, &id, &command.join(" "))
        .map_err(|e| describe(&e))?;
    Ok(EXIT_SUCCESS)
}

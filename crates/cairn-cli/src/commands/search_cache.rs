use super::{describe, read_registry};
use cairn_core::{CoreError, Engine};

/// Exits with the search tool's own exit code.
pub fn run(engine: &Engine, id: Option<&str>, query: &str) -> Result<u8, String> {
    let registry = read_registry(engine)?;
    let id = registry
        .check_container_id(id)
        .map_err(|e| describe(&CoreError::from(e)))?;
    let code = engine
        .search_cache(&registry, &id, query)
        .map_err(|e| describe(&e))?;
    Ok(u8::try_from(code).unwrap_or(super::EXIT_FAILURE))
}

use super::{json_pretty, with_registry, EXIT_SUCCESS};
use cairn_core::Engine;
use std::path::Path;

pub fn run(engine: &Engine, file: &Path, json: bool) -> Result<u8, String> {
    let added = with_registry(engine, |reg| engine.merge(reg, file))?;
    if json {
        println!(
            "{}",
            json_pretty(&serde_json::json!({
                "source": file.display().to_string(),
                "added": added,
            }))?
        );
    } else if added == 0 {
        println!("nothing to merge from {}", file.display());
    } else {
        println!("merged {added} container(s) from {}", file.display());
    }
    Ok(EXIT_SUCCESS)
}

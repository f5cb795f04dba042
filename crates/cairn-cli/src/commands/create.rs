use super::{json_pretty, with_registry, with_spinner, EXIT_SUCCESS};
use cairn_core::{CairnConfig, CreateRequest, Engine};
use cairn_schema::ContainerType;

pub struct CreateArgs {
    pub id: String,
    pub name: Option<String>,
    pub kind: Option<ContainerType>,
    pub distro: Option<String>,
    pub multiarch: bool,
    pub ask_password: bool,
    pub force: bool,
}

pub fn run(
    engine: &Engine,
    config: &CairnConfig,
    args: CreateArgs,
    json: bool,
) -> Result<u8, String> {
    let password = if args.ask_password {
        Some(
            dialoguer::Password::new()
                .with_prompt("Password for the container user")
                .with_confirmation("Repeat password", "passwords do not match")
                .interact()
                .map_err(|e| format!("password prompt failed: {e}"))?,
        )
    } else {
        None
    };

    let request = CreateRequest {
        id: args.id,
        name: args.name,
        kind: args.kind.or(config.default_type),
        distro: args.distro.or_else(|| config.default_distro.clone()),
        multiarch: args.multiarch,
        password,
        force: args.force,
    };

    let msg = format!("creating container '{}'...", request.id);
    let id = with_spinner(json, &msg, "container created", || {
        with_registry(engine, |reg| engine.create_container(reg, &request))
    })?;

    if json {
        let payload = serde_json::json!({
            "id": id,
            "status": "ready",
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("created container '{id}'");
    }
    Ok(EXIT_SUCCESS)
}

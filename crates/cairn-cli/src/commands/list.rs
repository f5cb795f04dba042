use super::{colorize_status, describe, json_pretty, read_registry, EXIT_SUCCESS};
use cairn_core::{CoreError, Engine};
use cairn_store::{Registry, StoreError};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ContainerRow<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    kind: String,
    distro: &'a str,
    status: String,
    default: bool,
}

pub fn containers(engine: &Engine, json: bool) -> Result<u8, String> {
    let registry = read_registry(engine)?;
    let default = registry.default_container().map(|id| id.as_str());
    let rows: Vec<ContainerRow<'_>> = registry
        .containers()
        .iter()
        .map(|c| ContainerRow {
            id: c.id.as_str(),
            name: &c.name,
            kind: c.kind.to_string(),
            distro: &c.distro,
            status: c
                .install_status
                .map_or_else(|| "unknown".to_owned(), |s| s.to_string()),
            default: default == Some(c.id.as_str()),
        })
        .collect();

    if json {
        println!("{}", json_pretty(&rows)?);
    } else if rows.is_empty() {
        println!("no containers found");
    } else {
        println!(
            "{:<2}{:<16} {:<20} {:<7} {:<8} STATUS",
            "", "ID", "NAME", "TYPE", "DISTRO"
        );
        for row in &rows {
            let marker = if row.default { "*" } else { "" };
            println!(
                "{:<2}{:<16} {:<20} {:<7} {:<8} {}",
                marker,
                row.id,
                row.name,
                row.kind,
                row.distro,
                colorize_status(&row.status)
            );
        }
    }
    Ok(EXIT_SUCCESS)
}

fn resolve(registry: &Registry, id: Option<&str>) -> Result<String, String> {
    registry
        .check_container_id(id)
        .map(|id| id.to_string())
        .map_err(|e| describe(&CoreError::from(e)))
}

fn store_err(e: StoreError) -> String {
    describe(&CoreError::from(e))
}

pub fn apps(engine: &Engine, id: Option<&str>, json: bool) -> Result<u8, String> {
    let registry = read_registry(engine)?;
    let id = resolve(&registry, id)?;
    let packages = registry.packages(&id).map_err(store_err)?;

    if json {
        println!("{}", json_pretty(&packages)?);
    } else if packages.is_empty() {
        println!("no packages recorded for '{id}'");
    } else {
        for p in packages {
            println!(
                "{:<32} {}",
                p.package_name,
                colorize_status(&p.app_status.to_string())
            );
        }
    }
    Ok(EXIT_SUCCESS)
}

pub fn archives(engine: &Engine, id: Option<&str>, json: bool) -> Result<u8, String> {
    let registry = read_registry(engine)?;
    let id = resolve(&registry, id)?;
    let archives = registry.archives(&id).map_err(store_err)?;

    if json {
        println!("{}", json_pretty(&archives)?);
    } else if archives.is_empty() {
        println!("no archives recorded for '{id}'");
    } else {
        for a in archives {
            println!(
                "{:<48} {}",
                a.archive_name,
                colorize_status(&a.archive_status.to_string())
            );
        }
    }
    Ok(EXIT_SUCCESS)
}

pub fn bind_mounts(engine: &Engine, id: Option<&str>, json: bool) -> Result<u8, String> {
    let registry = read_registry(engine)?;
    let id = resolve(&registry, id)?;
    let mounts = registry.bind_mounts(&id).map_err(store_err)?;

    if json {
        println!("{}", json_pretty(&mounts)?);
    } else if mounts.is_empty() {
        println!("no bind mounts recorded for '{id}'");
    } else {
        for m in mounts {
            println!("{m}");
        }
    }
    Ok(EXIT_SUCCESS)
}

use crate::registry::Registry;
use crate::{fsync_dir, StoreError};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Current registry schema version. Files without a version are version 1.
pub const REGISTRY_FORMAT_VERSION: u32 = 1;

/// Load the registry from `path`.
///
/// A missing or zero-length file is an empty registry. Anything else that is
/// not a valid registry document is a [`StoreError::Parse`]; there is no
/// best-effort partial parse.
pub fn load(path: &Path) -> Result<Registry, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("no registry at {}, starting empty", path.display());
            return Ok(Registry::new());
        }
        Err(e) => return Err(e.into()),
    };
    if content.is_empty() {
        return Ok(Registry::new());
    }

    let mut registry: Registry =
        serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: path.display().to_string(),
            source,
        })?;

    if registry.format_version() > REGISTRY_FORMAT_VERSION {
        return Err(StoreError::VersionMismatch {
            expected: REGISTRY_FORMAT_VERSION,
            found: registry.format_version(),
        });
    }
    registry.normalize_loaded()?;
    debug!(
        "loaded {} container(s) from {}",
        registry.len(),
        path.display()
    );
    Ok(registry)
}

/// Serialize the registry exactly as [`save`] writes it.
pub fn to_json(registry: &Registry) -> Result<String, StoreError> {
    let mut pruned = registry.clone();
    pruned.prune_removed();
    let mut json = serde_json::to_string_pretty(&pruned)?;
    json.push('\n');
    Ok(json)
}

/// Atomically write the full registry to `path`.
///
/// The content goes to a temp file in the same directory, is fsynced, renamed
/// over the target, and the directory is fsynced, so a reader never observes a
/// half-written registry.
pub fn save(registry: &Registry, path: &Path) -> Result<(), StoreError> {
    let content = to_json(registry)?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    fsync_dir(&dir)?;

    debug!("saved {} container(s) to {}", registry.len(), path.display());
    Ok(())
}

/// Union `registry` with the registry stored at `other_path`.
///
/// Containers from the other file whose id is not present are copied in whole.
/// Containers present in both keep the local record; there is no field-level
/// reconciliation, so divergent edits in the other file are ignored.
pub fn merge(mut registry: Registry, other_path: &Path) -> Result<Registry, StoreError> {
    let other = load(other_path)?;
    let merged = registry.merge_from(other);
    debug!("merged {merged} container(s) from {}", other_path.display());
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ContainerRecord;
    use cairn_schema::{ContainerId, ContainerStatus, ContainerType, ItemStatus};

    fn sample_registry() -> Registry {
        let mut reg = Registry::new();
        let mut work = ContainerRecord::new(
            ContainerId::new("work"),
            "Work",
            ContainerType::Lxd,
            "jammy",
        );
        work.install_status = Some(ContainerStatus::Ready);
        work.locale = Some("en_US.UTF-8".to_owned());
        reg.add_container(work).unwrap();
        reg.add_package("work", "vim", ItemStatus::Installed).unwrap();
        reg.add_archive("work", "ppa:git-core/ppa", ItemStatus::Installed)
            .unwrap();
        reg.add_bind_mount("work", "/home/user/Documents").unwrap();
        reg.set_default("work").unwrap();
        reg
    }

    #[test]
    fn missing_file_is_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let reg = load(&dir.path().join("containers.json")).unwrap();
        assert!(reg.is_empty());
        assert_eq!(reg.format_version(), REGISTRY_FORMAT_VERSION);
    }

    #[test]
    fn empty_file_is_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("containers.json");
        fs::write(&path, "").unwrap();
        assert!(load(&path).unwrap().is_empty());
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("containers.json");
        let reg = sample_registry();
        save(&reg, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, reg);
    }

    #[test]
    fn save_is_idempotent_through_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("containers.json");
        save(&sample_registry(), &path).unwrap();
        let first = fs::read_to_string(&path).unwrap();
        save(&load(&path).unwrap(), &path).unwrap();
        let second = fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn save_creates_parent_dir_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("containers.json");
        save(&sample_registry(), &path).unwrap();
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .flatten()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("containers.json");
        fs::write(&path, "NOT VALID JSON{{").unwrap();
        assert!(matches!(load(&path), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn unknown_status_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("containers.json");
        fs::write(
            &path,
            r#"{"containerList":[{"id":"work","type":"lxd","distro":"jammy","installStatus":"updating"}]}"#,
        )
        .unwrap();
        assert!(matches!(load(&path), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn newer_format_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("containers.json");
        fs::write(&path, r#"{"formatVersion":99,"containerList":[]}"#).unwrap();
        assert!(matches!(
            load(&path),
            Err(StoreError::VersionMismatch { found: 99, .. })
        ));
    }

    #[test]
    fn legacy_file_without_version_or_status_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("containers.json");
        fs::write(
            &path,
            r#"{
                "defaultContainer": "xenial",
                "containerList": [
                    {"id": "xenial", "name": "Ubuntu 'Xenial Xerus'", "type": "chroot",
                     "distro": "xenial", "installedApps": [
                        {"packageName": "gedit", "appStatus": "installed"}
                     ]}
                ]
            }"#,
        )
        .unwrap();
        let reg = load(&path).unwrap();
        assert_eq!(reg.format_version(), 1);
        let c = reg.container("xenial").unwrap();
        assert_eq!(c.install_status, None);
        assert_eq!(c.installed_apps.len(), 1);
        assert_eq!(reg.default_container().unwrap(), "xenial");
    }

    #[test]
    fn unknown_fields_survive_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("containers.json");
        fs::write(
            &path,
            r#"{
                "hostNote": "kept",
                "containerList": [
                    {"id": "work", "type": "lxd", "distro": "jammy",
                     "installStatus": "ready", "futureFlag": {"nested": [1, 2]},
                     "installedApps": [
                        {"packageName": "vim", "appStatus": "installed", "pinned": true}
                     ],
                     "extraArchives": [
                        {"archiveName": "ppa:a/b", "archiveStatus": "installed", "key": "ABCD"}
                     ]}
                ]
            }"#,
        )
        .unwrap();
        let reg = load(&path).unwrap();
        save(&reg, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["hostNote"], "kept");
        let c = &value["containerList"][0];
        assert_eq!(c["futureFlag"]["nested"][1], 2);
        assert_eq!(c["installedApps"][0]["pinned"], true);
        assert_eq!(c["extraArchives"][0]["key"], "ABCD");
    }

    #[test]
    fn removed_records_never_reach_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("containers.json");
        let mut reg = sample_registry();
        reg.set_package_status("work", "vim", ItemStatus::Removed)
            .unwrap();
        save(&reg, &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("\"removed\""));
        assert!(load(&path).unwrap().packages("work").unwrap().is_empty());
    }

    #[test]
    fn removed_records_on_disk_are_dropped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("containers.json");
        fs::write(
            &path,
            r#"{"containerList":[
                {"id":"gone","type":"lxc","distro":"focal","installStatus":"removed"},
                {"id":"kept","type":"lxc","distro":"focal","installStatus":"ready"}
            ]}"#,
        )
        .unwrap();
        let reg = load(&path).unwrap();
        assert_eq!(reg.len(), 1);
        assert!(reg.contains("kept"));
    }

    #[test]
    fn merge_copies_missing_containers_only() {
        let dir = tempfile::tempdir().unwrap();
        let other_path = dir.path().join("other.json");

        let mut other = Registry::new();
        let mut work = ContainerRecord::new(
            ContainerId::new("work"),
            "Other work",
            ContainerType::Chroot,
            "focal",
        );
        work.install_status = Some(ContainerStatus::Ready);
        other.add_container(work).unwrap();
        let mut play = ContainerRecord::new(
            ContainerId::new("play"),
            "Play",
            ContainerType::Lxc,
            "focal",
        );
        play.install_status = Some(ContainerStatus::Ready);
        other.add_container(play).unwrap();
        other.add_package("play", "supertux", ItemStatus::Installed)
            .unwrap();
        save(&other, &other_path).unwrap();

        let merged = merge(sample_registry(), &other_path).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.container("work").unwrap().name, "Work");
        assert_eq!(merged.packages("play").unwrap().len(), 1);
        assert_eq!(merged.default_container().unwrap(), "work");
    }

    #[test]
    fn merge_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let other_path = dir.path().join("other.json");
        let mut other = Registry::new();
        other
            .add_container(ContainerRecord::new(
                ContainerId::new("play"),
                "Play",
                ContainerType::Lxc,
                "focal",
            ))
            .unwrap();
        save(&other, &other_path).unwrap();

        let once = merge(sample_registry(), &other_path).unwrap();
        let twice = merge(once.clone(), &other_path).unwrap();
        assert_eq!(to_json(&once).unwrap(), to_json(&twice).unwrap());
    }

    #[test]
    fn merge_with_missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let merged = merge(sample_registry(), &dir.path().join("absent.json")).unwrap();
        assert_eq!(merged, sample_registry());
    }

    #[test]
    fn merge_with_corrupt_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let other_path = dir.path().join("other.json");
        fs::write(&other_path, "[garbage").unwrap();
        assert!(matches!(
            merge(sample_registry(), &other_path),
            Err(StoreError::Parse { .. })
        ));
    }

    #[test]
    fn path_like_id_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("containers.json");
        for id in ["../../victim", "/etc", "Work", "a"] {
            fs::write(
                &path,
                format!(r#"{{"containerList": [{{"id": "{id}", "type": "lxd", "distro": "jammy"}}]}}"#),
            )
            .unwrap();
            assert!(
                matches!(load(&path), Err(StoreError::Corrupt(_))),
                "{id} must be rejected"
            );
        }
    }

    #[test]
    fn merge_rejects_path_like_id() {
        let dir = tempfile::tempdir().unwrap();
        let other_path = dir.path().join("other.json");
        fs::write(
            &other_path,
            r#"{"containerList": [{"id": "../../victim", "type": "lxd", "distro": "jammy"}]}"#,
        )
        .unwrap();
        assert!(matches!(
            merge(sample_registry(), &other_path),
            Err(StoreError::Corrupt(_))
        ));
    }
}

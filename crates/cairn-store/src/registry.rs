use crate::codec::REGISTRY_FORMAT_VERSION;
use crate::StoreError;
use cairn_schema::{
    validate_container_id, ContainerId, ContainerStatus, ContainerType, ItemStatus,
    MultiarchSupport,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    pub package_name: String,
    pub app_status: ItemStatus,
    /// Fields written by newer tools, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, status: ItemStatus) -> Self {
        Self {
            package_name: name.into(),
            app_status: status,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRecord {
    pub archive_name: String,
    pub archive_status: ItemStatus,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ArchiveRecord {
    pub fn new(name: impl Into<String>, status: ItemStatus) -> Self {
        Self {
            archive_name: name.into(),
            archive_status: status,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    pub id: ContainerId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ContainerType,
    pub distro: String,
    /// `None` only for records written by a run that died before the first checkpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_status: Option<ContainerStatus>,
    #[serde(default)]
    pub multiarch: MultiarchSupport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default)]
    pub freeze_on_stop: bool,
    #[serde(default)]
    pub installed_apps: Vec<PackageRecord>,
    #[serde(default)]
    pub extra_archives: Vec<ArchiveRecord>,
    #[serde(default)]
    pub bind_mounts: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContainerRecord {
    pub fn new(
        id: ContainerId,
        name: impl Into<String>,
        kind: ContainerType,
        distro: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            distro: distro.into(),
            install_status: None,
            multiarch: MultiarchSupport::Disabled,
            locale: None,
            freeze_on_stop: false,
            installed_apps: Vec::new(),
            extra_archives: Vec::new(),
            bind_mounts: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn package(&self, name: &str) -> Option<&PackageRecord> {
        self.installed_apps.iter().find(|p| p.package_name == name)
    }

    pub fn archive(&self, name: &str) -> Option<&ArchiveRecord> {
        self.extra_archives.iter().find(|a| a.archive_name == name)
    }

    pub fn has_bind_mount(&self, path: &str) -> bool {
        self.bind_mounts.iter().any(|m| m == path)
    }

    fn prune_removed(&mut self) -> usize {
        let before = self.installed_apps.len() + self.extra_archives.len();
        self.installed_apps
            .retain(|p| p.app_status != ItemStatus::Removed);
        self.extra_archives
            .retain(|a| a.archive_status != ItemStatus::Removed);
        before - self.installed_apps.len() - self.extra_archives.len()
    }
}

/// The full container registry: every container with its nested records,
/// plus the optional default container.
///
/// Every mutator is a pure in-memory write. Callers persist with
/// [`crate::save`] after each durable checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    #[serde(default = "legacy_format_version")]
    format_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_container: Option<ContainerId>,
    #[serde(default)]
    container_list: Vec<ContainerRecord>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn legacy_format_version() -> u32 {
    1
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            format_version: REGISTRY_FORMAT_VERSION,
            default_container: None,
            container_list: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    pub fn containers(&self) -> &[ContainerRecord] {
        &self.container_list
    }

    pub fn len(&self) -> usize {
        self.container_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.container_list.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.container_list.iter().any(|c| c.id == id)
    }

    pub fn container(&self, id: &str) -> Result<&ContainerRecord, StoreError> {
        self.container_list
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::ContainerNotFound(id.to_owned()))
    }

    fn container_mut(&mut self, id: &str) -> Result<&mut ContainerRecord, StoreError> {
        self.container_list
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::ContainerNotFound(id.to_owned()))
    }

    /// Resolve the container an operation targets.
    ///
    /// An explicit id must exist. Without one, the default container is used;
    /// even a single-container registry needs an explicit default.
    pub fn check_container_id(&self, requested: Option<&str>) -> Result<ContainerId, StoreError> {
        match requested {
            Some(id) => self.container(id).map(|c| c.id.clone()),
            None => match &self.default_container {
                Some(id) => Ok(id.clone()),
                None if self.is_empty() => Err(StoreError::NoContainers),
                None => Err(StoreError::NoDefaultContainer),
            },
        }
    }

    pub fn add_container(&mut self, record: ContainerRecord) -> Result<(), StoreError> {
        validate_container_id(&record.id)?;
        if self.contains(&record.id) {
            return Err(StoreError::ContainerExists(record.id.into_inner()));
        }
        self.container_list.push(record);
        Ok(())
    }

    /// Remove a container record, clearing the default if it pointed here.
    pub fn delete_container(&mut self, id: &str) -> Result<ContainerRecord, StoreError> {
        let idx = self
            .container_list
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| StoreError::ContainerNotFound(id.to_owned()))?;
        if self.default_container.as_ref().is_some_and(|d| *d == id) {
            self.default_container = None;
        }
        Ok(self.container_list.remove(idx))
    }

    pub fn container_status(&self, id: &str) -> Result<Option<ContainerStatus>, StoreError> {
        Ok(self.container(id)?.install_status)
    }

    pub fn set_container_status(
        &mut self,
        id: &str,
        status: ContainerStatus,
    ) -> Result<(), StoreError> {
        self.container_mut(id)?.install_status = Some(status);
        Ok(())
    }

    pub fn set_container_name(&mut self, id: &str, name: &str) -> Result<(), StoreError> {
        name.clone_into(&mut self.container_mut(id)?.name);
        Ok(())
    }

    pub fn set_locale(&mut self, id: &str, locale: &str) -> Result<(), StoreError> {
        self.container_mut(id)?.locale = Some(locale.to_owned());
        Ok(())
    }

    pub fn set_multiarch(&mut self, id: &str, support: MultiarchSupport) -> Result<(), StoreError> {
        self.container_mut(id)?.multiarch = support;
        Ok(())
    }

    pub fn set_freeze_on_stop(&mut self, id: &str, freeze: bool) -> Result<(), StoreError> {
        self.container_mut(id)?.freeze_on_stop = freeze;
        Ok(())
    }

    // Packages

    pub fn packages(&self, id: &str) -> Result<&[PackageRecord], StoreError> {
        Ok(&self.container(id)?.installed_apps)
    }

    pub fn package(&self, id: &str, name: &str) -> Result<&PackageRecord, StoreError> {
        self.container(id)?
            .package(name)
            .ok_or_else(|| StoreError::PackageNotFound {
                container: id.to_owned(),
                package: name.to_owned(),
            })
    }

    pub fn add_package(
        &mut self,
        id: &str,
        name: &str,
        status: ItemStatus,
    ) -> Result<(), StoreError> {
        let container = self.container_mut(id)?;
        if container.package(name).is_some() {
            return Err(StoreError::PackageExists {
                container: id.to_owned(),
                package: name.to_owned(),
            });
        }
        container.installed_apps.push(PackageRecord::new(name, status));
        Ok(())
    }

    pub fn set_package_status(
        &mut self,
        id: &str,
        name: &str,
        status: ItemStatus,
    ) -> Result<(), StoreError> {
        let record = self
            .container_mut(id)?
            .installed_apps
            .iter_mut()
            .find(|p| p.package_name == name)
            .ok_or_else(|| StoreError::PackageNotFound {
                container: id.to_owned(),
                package: name.to_owned(),
            })?;
        record.app_status = status;
        Ok(())
    }

    pub fn delete_package(&mut self, id: &str, name: &str) -> Result<PackageRecord, StoreError> {
        let container = self.container_mut(id)?;
        let idx = container
            .installed_apps
            .iter()
            .position(|p| p.package_name == name)
            .ok_or_else(|| StoreError::PackageNotFound {
                container: id.to_owned(),
                package: name.to_owned(),
            })?;
        Ok(container.installed_apps.remove(idx))
    }

    // Archives

    pub fn archives(&self, id: &str) -> Result<&[ArchiveRecord], StoreError> {
        Ok(&self.container(id)?.extra_archives)
    }

    pub fn archive(&self, id: &str, name: &str) -> Result<&ArchiveRecord, StoreError> {
        self.container(id)?
            .archive(name)
            .ok_or_else(|| StoreError::ArchiveNotFound {
                container: id.to_owned(),
                archive: name.to_owned(),
            })
    }

    pub fn add_archive(
        &mut self,
        id: &str,
        name: &str,
        status: ItemStatus,
    ) -> Result<(), StoreError> {
        let container = self.container_mut(id)?;
        if container.archive(name).is_some() {
            return Err(StoreError::ArchiveExists {
                container: id.to_owned(),
                archive: name.to_owned(),
            });
        }
        container.extra_archives.push(ArchiveRecord::new(name, status));
        Ok(())
    }

    pub fn set_archive_status(
        &mut self,
        id: &str,
        name: &str,
        status: ItemStatus,
    ) -> Result<(), StoreError> {
        let record = self
            .container_mut(id)?
            .extra_archives
            .iter_mut()
            .find(|a| a.archive_name == name)
            .ok_or_else(|| StoreError::ArchiveNotFound {
                container: id.to_owned(),
                archive: name.to_owned(),
            })?;
        record.archive_status = status;
        Ok(())
    }

    pub fn delete_archive(&mut self, id: &str, name: &str) -> Result<ArchiveRecord, StoreError> {
        let container = self.container_mut(id)?;
        let idx = container
            .extra_archives
            .iter()
            .position(|a| a.archive_name == name)
            .ok_or_else(|| StoreError::ArchiveNotFound {
                container: id.to_owned(),
                archive: name.to_owned(),
            })?;
        Ok(container.extra_archives.remove(idx))
    }

    // Bind mounts

    pub fn bind_mounts(&self, id: &str) -> Result<&[String], StoreError> {
        Ok(&self.container(id)?.bind_mounts)
    }

    pub fn add_bind_mount(&mut self, id: &str, path: &str) -> Result<(), StoreError> {
        let container = self.container_mut(id)?;
        if container.has_bind_mount(path) {
            return Err(StoreError::BindMountExists {
                container: id.to_owned(),
                path: path.to_owned(),
            });
        }
        container.bind_mounts.push(path.to_owned());
        Ok(())
    }

    pub fn delete_bind_mount(&mut self, id: &str, path: &str) -> Result<(), StoreError> {
        let container = self.container_mut(id)?;
        let idx = container
            .bind_mounts
            .iter()
            .position(|m| m == path)
            .ok_or_else(|| StoreError::BindMountNotFound {
                container: id.to_owned(),
                path: path.to_owned(),
            })?;
        container.bind_mounts.remove(idx);
        Ok(())
    }

    // Default container

    pub fn default_container(&self) -> Option<&ContainerId> {
        self.default_container.as_ref()
    }

    pub fn set_default(&mut self, id: &str) -> Result<(), StoreError> {
        let id = self.container(id)?.id.clone();
        self.default_container = Some(id);
        Ok(())
    }

    /// Unset the default container. `confirm` must be true; losing the default
    /// silently would make every id-less command fail afterwards.
    pub fn clear_default(&mut self, confirm: bool) -> Result<(), StoreError> {
        if !confirm {
            return Err(StoreError::ConfirmationRequired(
                "clear the default container".to_owned(),
            ));
        }
        self.default_container = None;
        Ok(())
    }

    /// Copy in every container of `other` whose id is not present yet.
    /// Containers present in both are left untouched. Returns the number copied.
    pub fn merge_from(&mut self, other: Registry) -> usize {
        let mut merged = 0;
        for record in other.container_list {
            if !self.contains(&record.id) {
                self.container_list.push(record);
                merged += 1;
            }
        }
        merged
    }

    /// Drop every record still carrying a `removed` status. Returns how many went.
    pub fn prune_removed(&mut self) -> usize {
        let before = self.container_list.len();
        self.container_list
            .retain(|c| c.install_status != Some(ContainerStatus::Removed));
        let mut pruned = before - self.container_list.len();
        for container in &mut self.container_list {
            pruned += container.prune_removed();
        }
        if let Some(default) = &self.default_container {
            if !self.container_list.iter().any(|c| c.id == *default) {
                self.default_container = None;
            }
        }
        pruned
    }

    /// Enforce the registry invariants on freshly loaded data.
    ///
    /// Malformed ids and duplicate keys are fatal. `removed` records and a dangling default are
    /// normalized away with a warning.
    pub(crate) fn normalize_loaded(&mut self) -> Result<(), StoreError> {
        let mut ids = HashSet::new();
        for c in &self.container_list {
            validate_container_id(&c.id).map_err(|e| StoreError::Corrupt(e.to_string()))?;
            if !ids.insert(c.id.as_str()) {
                return Err(StoreError::Corrupt(format!(
                    "duplicate container id '{}'",
                    c.id
                )));
            }
            let mut names = HashSet::new();
            if let Some(p) = c
                .installed_apps
                .iter()
                .find(|p| !names.insert(p.package_name.as_str()))
            {
                return Err(StoreError::Corrupt(format!(
                    "duplicate package '{}' in container '{}'",
                    p.package_name, c.id
                )));
            }
            let mut names = HashSet::new();
            if let Some(a) = c
                .extra_archives
                .iter()
                .find(|a| !names.insert(a.archive_name.as_str()))
            {
                return Err(StoreError::Corrupt(format!(
                    "duplicate archive '{}' in container '{}'",
                    a.archive_name, c.id
                )));
            }
            let mut paths = HashSet::new();
            if let Some(m) = c.bind_mounts.iter().find(|m| !paths.insert(m.as_str())) {
                return Err(StoreError::Corrupt(format!(
                    "duplicate bind mount '{m}' in container '{}'",
                    c.id
                )));
            }
        }

        let pruned = self.prune_removed();
        if pruned > 0 {
            warn!("dropped {pruned} record(s) left in 'removed' status");
        }
        if let Some(default) = &self.default_container {
            if !self.contains(default) {
                warn!("default container '{default}' does not exist; clearing it");
                self.default_container = None;
            }
        }
        Ok(())
    }
}

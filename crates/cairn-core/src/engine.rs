use crate::lifecycle::{validate_container_transition, validate_item_transition};
use crate::mounts::MountPolicy;
use crate::CoreError;
use cairn_runtime::{shell_quote, ContainerDriver, ContainerSpec, HostInfo, RuntimeError};
use cairn_schema::{
    normalize_absolute_path, ContainerId, ContainerStatus, ContainerType, ItemStatus,
    MultiarchSupport,
};
use cairn_store::{ContainerRecord, Registry, StoreError, StoreLayout};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SOFTWARE_PROPERTIES: &str = "software-properties-common";

/// Parameters for [`Engine::create_container`]. Unset fields fall back to
/// host-derived defaults.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub id: String,
    pub name: Option<String>,
    pub kind: Option<ContainerType>,
    pub distro: Option<String>,
    pub multiarch: bool,
    pub password: Option<String>,
    /// Accept a distro the host does not list as valid.
    pub force: bool,
}

impl CreateRequest {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Result of a bind-mount change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountOutcome {
    pub path: String,
    pub restarted: bool,
    /// Set when the follow-up restart failed; the mount change itself stands.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Orchestrates container lifecycle operations against a registry and a driver.
///
/// The registry is owned by the caller and passed into every operation. Each
/// durable checkpoint is saved to the store before the next side effect, so a
/// crash leaves at most one record in an in-progress status for
/// [`Engine::fix_integrity`] to repair.
pub struct Engine {
    layout: StoreLayout,
    driver: Arc<dyn ContainerDriver>,
    host: Arc<dyn HostInfo>,
}

fn backend(container: &str, operation: impl Into<String>, err: &RuntimeError) -> CoreError {
    CoreError::Backend {
        container: container.to_owned(),
        operation: operation.into(),
        detail: err.to_string(),
    }
}

impl Engine {
    pub fn new(
        layout: StoreLayout,
        driver: Arc<dyn ContainerDriver>,
        host: Arc<dyn HostInfo>,
    ) -> Self {
        Self {
            layout,
            driver,
            host,
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn host(&self) -> &dyn HostInfo {
        self.host.as_ref()
    }

    pub(crate) fn driver(&self) -> &dyn ContainerDriver {
        self.driver.as_ref()
    }

    /// Load the registry from this engine's store.
    pub fn load_registry(&self) -> Result<Registry, CoreError> {
        Ok(cairn_store::load(&self.layout.registry_file())?)
    }

    pub(crate) fn persist(&self, registry: &Registry) -> Result<(), CoreError> {
        cairn_store::save(registry, &self.layout.registry_file())?;
        Ok(())
    }

    pub(crate) fn spec_for(&self, record: &ContainerRecord) -> ContainerSpec {
        ContainerSpec {
            id: record.id.clone(),
            kind: record.kind,
            distro: record.distro.clone(),
            architecture: self.host.architecture(),
            root_path: self.layout.rootfs_dir(&record.id),
            multiarch: record.multiarch.is_enabled(),
            locale: record.locale.clone(),
            user: self.host.user_name(),
            bind_mounts: record.bind_mounts.clone(),
        }
    }

    fn default_type(&self) -> ContainerType {
        if self.host.has_lxd_support() {
            ContainerType::Lxd
        } else if self.host.has_lxc_support() {
            ContainerType::Lxc
        } else {
            ContainerType::Chroot
        }
    }

    fn check_type_supported(&self, kind: ContainerType) -> Result<(), CoreError> {
        let supported = match kind {
            ContainerType::Lxc => self.host.has_lxc_support(),
            ContainerType::Lxd => self.host.has_lxd_support(),
            ContainerType::Chroot => true,
        };
        if supported {
            Ok(())
        } else {
            Err(CoreError::Unsupported(format!(
                "this host has no {kind} support"
            )))
        }
    }

    /// Look up a container that must be `ready` and build its driver spec.
    fn ready_spec(&self, registry: &Registry, id: &str) -> Result<ContainerSpec, CoreError> {
        let record = registry.container(id)?;
        match record.install_status {
            Some(ContainerStatus::Ready) => Ok(self.spec_for(record)),
            other => Err(CoreError::NotReady {
                container: id.to_owned(),
                status: other.map_or_else(|| "unknown".to_owned(), |s| s.to_string()),
            }),
        }
    }

    // Containers

    pub fn create_container(
        &self,
        registry: &mut Registry,
        request: &CreateRequest,
    ) -> Result<ContainerId, CoreError> {
        let id = ContainerId::parse(&request.id)?;
        if registry.contains(&id) {
            return Err(StoreError::ContainerExists(id.into_inner()).into());
        }
        let kind = request.kind.unwrap_or_else(|| self.default_type());
        self.check_type_supported(kind)?;
        let distro = request
            .distro
            .clone()
            .unwrap_or_else(|| self.host.distro_release());
        if !self.host.is_distro_valid(&distro, request.force) {
            return Err(CoreError::InvalidDistro(distro));
        }
        if request.multiarch && !self.host.is_64bit() {
            return Err(CoreError::Unsupported(
                "multiarch support requires a 64-bit host".to_owned(),
            ));
        }

        info!("creating {kind} container '{id}' ({distro})");
        let name = request
            .name
            .clone()
            .unwrap_or_else(|| format!("Ubuntu '{distro}'"));
        let mut record = ContainerRecord::new(id.clone(), name, kind, distro);
        record.install_status = Some(ContainerStatus::Installing);
        record.multiarch = MultiarchSupport::from_enabled(request.multiarch);
        record.locale = Some(self.host.locale());
        let spec = self.spec_for(&record);

        registry.add_container(record)?;
        self.persist(registry)?;
        debug!("container '{id}' recorded as installing");

        if let Err(e) = self.driver.create(&spec, request.password.as_deref()) {
            warn!("create of '{id}' failed, removing its record: {e}");
            registry.delete_container(&id)?;
            self.persist(registry)?;
            self.remove_container_dir(&id);
            return Err(backend(&id, "create container", &e));
        }

        validate_container_transition(ContainerStatus::Installing, ContainerStatus::Ready)?;
        registry.set_container_status(&id, ContainerStatus::Ready)?;
        self.persist(registry)?;
        info!("container '{id}' is ready");
        Ok(id)
    }

    pub fn destroy_container(
        &self,
        registry: &mut Registry,
        id: &str,
        force: bool,
    ) -> Result<(), CoreError> {
        let record = registry.container(id)?;
        let status = record.install_status.ok_or_else(|| CoreError::NotReady {
            container: id.to_owned(),
            status: "unknown".to_owned(),
        })?;
        validate_container_transition(status, ContainerStatus::Removing)?;
        let spec = self.spec_for(record);

        info!("destroying container '{id}'");
        registry.set_container_status(id, ContainerStatus::Removing)?;
        self.persist(registry)?;

        if let Err(e) = self.driver.destroy(&spec, force) {
            warn!("destroy of '{id}' failed, restoring status {status}: {e}");
            registry.set_container_status(id, status)?;
            self.persist(registry)?;
            return Err(backend(id, "destroy container", &e));
        }

        registry.delete_container(id)?;
        self.persist(registry)?;
        self.remove_container_dir(id);
        Ok(())
    }

    pub(crate) fn remove_container_dir(&self, id: &str) {
        let dir = self.layout.container_path(id);
        if dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                warn!("failed to remove {}: {e}", dir.display());
            }
        }
    }

    /// Bring the container's locale in line with the host and upgrade its packages.
    pub fn update_container(&self, registry: &mut Registry, id: &str) -> Result<(), CoreError> {
        let spec = self.ready_spec(registry, id)?;
        let host_locale = self.host.locale();
        let locale_changed = spec.locale.as_deref() != Some(host_locale.as_str());

        info!("updating container '{id}'");
        if locale_changed {
            let quoted = shell_quote(&host_locale);
            self.driver
                .exec(
                    &spec,
                    &format!("locale-gen {quoted} && update-locale LANG={quoted}"),
                )
                .map_err(|e| backend(id, "update locale", &e))?;
        }
        self.driver
            .exec(&spec, "apt-get update")
            .map_err(|e| backend(id, "refresh package index", &e))?;
        self.driver
            .exec(
                &spec,
                "DEBIAN_FRONTEND=noninteractive apt-get dist-upgrade -y",
            )
            .map_err(|e| backend(id, "upgrade packages", &e))?;

        if locale_changed {
            registry.set_locale(id, &host_locale)?;
            self.persist(registry)?;
            debug!("container '{id}' locale set to {host_locale}");
        }
        Ok(())
    }

    pub fn restart_container(&self, registry: &Registry, id: &str) -> Result<(), CoreError> {
        let spec = self.ready_spec(registry, id)?;
        self.driver
            .restart(&spec)
            .map_err(|e| backend(id, "restart container", &e))
    }

    pub fn rename_container(
        &self,
        registry: &mut Registry,
        id: &str,
        name: &str,
    ) -> Result<(), CoreError> {
        registry.set_container_name(id, name)?;
        self.persist(registry)
    }

    pub fn exec(&self, registry: &Registry, id: &str, command: &str) -> Result<(), CoreError> {
        let spec = self.ready_spec(registry, id)?;
        self.driver
            .exec(&spec, command)
            .map_err(|e| backend(id, format!("run `{command}`"), &e))
    }

    /// Search the container's package cache; returns the search tool's exit code.
    pub fn search_cache(
        &self,
        registry: &Registry,
        id: &str,
        query: &str,
    ) -> Result<i32, CoreError> {
        let spec = self.ready_spec(registry, id)?;
        self.driver
            .search_cache(&spec, query)
            .map_err(|e| backend(id, format!("search for '{query}'"), &e))
    }

    // Packages

    /// Install each package in caller order, isolating failures per package.
    ///
    /// Packages that installed keep their `installed` record even when others
    /// fail; the error lists only the failures.
    pub fn install_packages(
        &self,
        registry: &mut Registry,
        id: &str,
        packages: &[String],
        interactive: bool,
    ) -> Result<(), CoreError> {
        let spec = self.ready_spec(registry, id)?;
        let mut failed = Vec::new();
        let mut update_cache = true;

        for package in packages {
            if registry.package(id, package).is_ok() {
                failed.push((package.clone(), "already installed".to_owned()));
                continue;
            }
            info!("installing '{package}' in '{id}'");
            registry.add_package(id, package, ItemStatus::Installing)?;
            self.persist(registry)?;

            let result = self
                .driver
                .install_package(&spec, package, interactive, update_cache);
            update_cache = false;
            match result {
                Ok(()) => {
                    registry.set_package_status(id, package, ItemStatus::Installed)?;
                }
                Err(e) => {
                    warn!("install of '{package}' in '{id}' failed: {e}");
                    registry.delete_package(id, package)?;
                    failed.push((package.clone(), e.to_string()));
                }
            }
            self.persist(registry)?;
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(CoreError::BatchFailed {
                container: id.to_owned(),
                operation: "install packages".to_owned(),
                failed,
            })
        }
    }

    /// Remove each package in caller order. A package whose removal fails goes
    /// back to `installed`.
    pub fn remove_packages(
        &self,
        registry: &mut Registry,
        id: &str,
        packages: &[String],
        interactive: bool,
    ) -> Result<(), CoreError> {
        let spec = self.ready_spec(registry, id)?;
        let mut failed = Vec::new();

        for package in packages {
            let status = match registry.package(id, package) {
                Ok(p) => p.app_status,
                Err(e) => {
                    failed.push((package.clone(), e.to_string()));
                    continue;
                }
            };
            if let Err(e) = validate_item_transition(status, ItemStatus::Removing) {
                failed.push((package.clone(), e.to_string()));
                continue;
            }
            info!("removing '{package}' from '{id}'");
            registry.set_package_status(id, package, ItemStatus::Removing)?;
            self.persist(registry)?;

            match self.driver.remove_package(&spec, package, interactive) {
                Ok(()) => {
                    registry.set_package_status(id, package, ItemStatus::Removed)?;
                    registry.delete_package(id, package)?;
                }
                Err(e) => {
                    warn!("removal of '{package}' from '{id}' failed: {e}");
                    registry.set_package_status(id, package, status)?;
                    failed.push((package.clone(), e.to_string()));
                }
            }
            self.persist(registry)?;
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(CoreError::BatchFailed {
                container: id.to_owned(),
                operation: "remove packages".to_owned(),
                failed,
            })
        }
    }

    // Archives

    pub fn add_archive(
        &self,
        registry: &mut Registry,
        id: &str,
        archive: &str,
    ) -> Result<(), CoreError> {
        let spec = self.ready_spec(registry, id)?;
        registry.add_archive(id, archive, ItemStatus::Installing)?;
        self.persist(registry)?;
        info!("adding archive '{archive}' to '{id}'");

        if let Err(e) = self.run_add_apt_repository(&spec, archive) {
            warn!("adding archive '{archive}' to '{id}' failed: {e}");
            registry.delete_archive(id, archive)?;
            self.persist(registry)?;
            return Err(e);
        }

        registry.set_archive_status(id, archive, ItemStatus::Installed)?;
        self.persist(registry)
    }

    fn run_add_apt_repository(&self, spec: &ContainerSpec, archive: &str) -> Result<(), CoreError> {
        if !self.driver.binary_exists(spec, "add-apt-repository") {
            debug!("add-apt-repository missing in '{}'", spec.id);
            self.driver
                .install_package(spec, SOFTWARE_PROPERTIES, false, true)
                .map_err(|e| backend(&spec.id, format!("install {SOFTWARE_PROPERTIES}"), &e))?;
        }
        self.driver
            .exec(
                spec,
                &format!("add-apt-repository -y {}", shell_quote(archive)),
            )
            .map_err(|e| backend(&spec.id, format!("add archive '{archive}'"), &e))
    }

    pub fn remove_archive(
        &self,
        registry: &mut Registry,
        id: &str,
        archive: &str,
    ) -> Result<(), CoreError> {
        let spec = self.ready_spec(registry, id)?;
        let status = registry.archive(id, archive)?.archive_status;
        validate_item_transition(status, ItemStatus::Removing)?;
        registry.set_archive_status(id, archive, ItemStatus::Removing)?;
        self.persist(registry)?;
        info!("removing archive '{archive}' from '{id}'");

        let command = format!("add-apt-repository -y -r {}", shell_quote(archive));
        if let Err(e) = self.driver.exec(&spec, &command) {
            warn!("removing archive '{archive}' from '{id}' failed: {e}");
            registry.set_archive_status(id, archive, status)?;
            self.persist(registry)?;
            return Err(backend(id, format!("remove archive '{archive}'"), &e));
        }

        registry.set_archive_status(id, archive, ItemStatus::Removed)?;
        registry.delete_archive(id, archive)?;
        self.persist(registry)
    }

    // Container settings

    pub fn set_multiarch(
        &self,
        registry: &mut Registry,
        id: &str,
        enabled: bool,
    ) -> Result<(), CoreError> {
        if !self.host.is_64bit() {
            return Err(CoreError::Unsupported(
                "multiarch support requires a 64-bit host".to_owned(),
            ));
        }
        let wanted = MultiarchSupport::from_enabled(enabled);
        if registry.container(id)?.multiarch == wanted {
            return Err(CoreError::AlreadyInState(format!(
                "multiarch support is already {wanted} for container '{id}'"
            )));
        }
        let spec = self.ready_spec(registry, id)?;

        if enabled {
            self.driver
                .exec(&spec, "dpkg --add-architecture i386")
                .map_err(|e| backend(id, "enable multiarch", &e))?;
        } else {
            self.driver
                .exec(
                    &spec,
                    "DEBIAN_FRONTEND=noninteractive apt-get purge -y '.*:i386'",
                )
                .map_err(|e| backend(id, "purge i386 packages", &e))?;
            self.driver
                .exec(&spec, "dpkg --remove-architecture i386")
                .map_err(|e| backend(id, "disable multiarch", &e))?;
        }

        registry.set_multiarch(id, wanted)?;
        self.persist(registry)
    }

    pub fn set_freeze_on_stop(
        &self,
        registry: &mut Registry,
        id: &str,
        freeze: bool,
    ) -> Result<(), CoreError> {
        let record = registry.container(id)?;
        if !record.kind.is_persistent() {
            return Err(CoreError::Unsupported(format!(
                "freeze on stop is not available for {} container '{id}'",
                record.kind
            )));
        }
        if record.freeze_on_stop == freeze {
            let state = if freeze { "on" } else { "off" };
            return Err(CoreError::AlreadyInState(format!(
                "freeze on stop is already {state} for container '{id}'"
            )));
        }
        registry.set_freeze_on_stop(id, freeze)?;
        self.persist(registry)
    }

    // Bind mounts

    pub fn add_bind_mount(
        &self,
        registry: &mut Registry,
        id: &str,
        path: &str,
    ) -> Result<MountOutcome, CoreError> {
        let kind = registry.container(id)?.kind;
        let normalized = MountPolicy::from_host(self.host.as_ref()).validate(path, kind)?;
        registry.add_bind_mount(id, &normalized)?;
        self.persist(registry)?;
        info!("added bind mount '{normalized}' to '{id}'");
        Ok(self.restart_after_mount_change(registry, id, normalized))
    }

    pub fn remove_bind_mount(
        &self,
        registry: &mut Registry,
        id: &str,
        path: &str,
    ) -> Result<MountOutcome, CoreError> {
        // Only membership matters here; a recorded mount may predate the current policy.
        let normalized = normalize_absolute_path(path)?;
        registry.delete_bind_mount(id, &normalized)?;
        self.persist(registry)?;
        info!("removed bind mount '{normalized}' from '{id}'");
        Ok(self.restart_after_mount_change(registry, id, normalized))
    }

    /// A frozen container only picks up mount changes through a restart.
    fn restart_after_mount_change(
        &self,
        registry: &Registry,
        id: &str,
        path: String,
    ) -> MountOutcome {
        let mut outcome = MountOutcome {
            path,
            restarted: false,
            warning: None,
        };
        let Ok(record) = registry.container(id) else {
            return outcome;
        };
        if !(record.kind.is_persistent() && record.freeze_on_stop) {
            return outcome;
        }
        match self.driver.restart(&self.spec_for(record)) {
            Ok(()) => outcome.restarted = true,
            Err(e) => {
                warn!("restart of '{id}' after bind mount change failed: {e}");
                outcome.warning = Some(format!(
                    "container '{id}' could not be restarted; restart it to apply '{}': {e}",
                    outcome.path
                ));
            }
        }
        outcome
    }

    // Registry-wide

    /// Copy in containers from another registry file. Returns how many were added.
    pub fn merge(&self, registry: &mut Registry, other_path: &Path) -> Result<usize, CoreError> {
        let other = cairn_store::load(other_path)?;
        let merged = registry.merge_from(other);
        self.persist(registry)?;
        info!("merged {merged} container(s) from {}", other_path.display());
        Ok(merged)
    }

    pub fn set_default(&self, registry: &mut Registry, id: &str) -> Result<(), CoreError> {
        registry.set_default(id)?;
        self.persist(registry)
    }

    pub fn clear_default(&self, registry: &mut Registry, confirm: bool) -> Result<(), CoreError> {
        registry.clear_default(confirm)?;
        self.persist(registry)
    }
}

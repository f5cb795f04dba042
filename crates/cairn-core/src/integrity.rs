use crate::engine::Engine;
use crate::CoreError;
use cairn_schema::{ContainerStatus, ItemStatus};
use cairn_store::Registry;
use serde::Serialize;
use tracing::{info, warn};

/// What a fix-up pass repaired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// Containers found abandoned mid-create or mid-destroy and deleted.
    pub destroyed_containers: Vec<String>,
    /// `(container, package)` records left in progress and removed.
    pub removed_packages: Vec<(String, String)>,
    /// `(container, archive)` records left in progress and dropped.
    pub dropped_archives: Vec<(String, String)>,
    /// Driver failures that were logged and skipped.
    pub warnings: Vec<String>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.destroyed_containers.is_empty()
            && self.removed_packages.is_empty()
            && self.dropped_archives.is_empty()
    }
}

fn is_abandoned(status: Option<ContainerStatus>) -> bool {
    matches!(
        status,
        None | Some(ContainerStatus::Installing | ContainerStatus::Removing)
    )
}

impl Engine {
    /// Roll every interrupted record forward to deletion.
    ///
    /// An in-progress status found here can only come from a run that died,
    /// and the original intent cannot be recovered from the status alone, so
    /// nothing is retried.
    pub fn fix_integrity(&self, registry: &mut Registry) -> Result<IntegrityReport, CoreError> {
        let mut report = IntegrityReport::default();
        let ids: Vec<String> = registry
            .containers()
            .iter()
            .map(|c| c.id.to_string())
            .collect();

        for id in ids {
            let record = registry.container(&id)?;
            let spec = self.spec_for(record);

            if is_abandoned(record.install_status) {
                info!("destroying abandoned container '{id}'");
                if let Err(e) = self.driver().destroy(&spec, true) {
                    warn!("forced destroy of '{id}' failed: {e}");
                    report
                        .warnings
                        .push(format!("destroy container '{id}': {e}"));
                }
                registry.delete_container(&id)?;
                self.persist(registry)?;
                self.remove_container_dir(&id);
                report.destroyed_containers.push(id);
                continue;
            }

            let packages: Vec<String> = record
                .installed_apps
                .iter()
                .filter(|p| p.app_status != ItemStatus::Installed)
                .map(|p| p.package_name.clone())
                .collect();
            let archives: Vec<String> = record
                .extra_archives
                .iter()
                .filter(|a| a.archive_status != ItemStatus::Installed)
                .map(|a| a.archive_name.clone())
                .collect();
            if packages.is_empty() && archives.is_empty() {
                continue;
            }

            for package in packages {
                info!("removing interrupted package '{package}' from '{id}'");
                if let Err(e) = self.driver().remove_package(&spec, &package, false) {
                    warn!("removal of '{package}' from '{id}' failed: {e}");
                    report
                        .warnings
                        .push(format!("remove package '{package}' from '{id}': {e}"));
                }
                registry.delete_package(&id, &package)?;
                report.removed_packages.push((id.clone(), package));
            }
            for archive in archives {
                info!("dropping interrupted archive '{archive}' from '{id}'");
                registry.delete_archive(&id, &archive)?;
                report.dropped_archives.push((id.clone(), archive));
            }
            self.persist(registry)?;
        }

        Ok(report)
    }
}

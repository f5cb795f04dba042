use crate::driver::{ContainerDriver, ContainerSpec};
use crate::host::HostInfo;
use crate::RuntimeError;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

/// One recorded driver invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Create { id: String },
    Destroy { id: String, force: bool },
    Exec { id: String, command: String },
    InstallPackage { id: String, package: String, update_cache: bool },
    RemovePackage { id: String, package: String },
    Restart { id: String },
    BinaryExists { id: String, name: String },
    SearchCache { id: String, query: String },
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<DriverCall>,
    fail_create: bool,
    fail_destroy: bool,
    fail_restart: bool,
    fail_exec: Vec<String>,
    fail_install: HashSet<String>,
    fail_remove: HashSet<String>,
    missing_binaries: HashSet<String>,
    search_exit_code: i32,
}

/// Driver that records every call and fails on demand.
///
/// Failure switches take `&self` so a test can keep a clone of the `Arc`
/// handed to the engine and arm failures between operations.
#[derive(Debug, Default)]
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>, RuntimeError> {
        self.state
            .lock()
            .map_err(|e| RuntimeError::ExecFailed(format!("mutex poisoned: {e}")))
    }

    fn with_state(&self, f: impl FnOnce(&mut MockState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }

    fn record(&self, call: DriverCall) -> Result<MutexGuard<'_, MockState>, RuntimeError> {
        let mut state = self.lock()?;
        state.calls.push(call);
        Ok(state)
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().map(|s| s.calls.len()).unwrap_or(0)
    }

    pub fn clear_calls(&self) {
        self.with_state(|s| s.calls.clear());
    }

    pub fn fail_create(&self, fail: bool) {
        self.with_state(|s| s.fail_create = fail);
    }

    pub fn fail_destroy(&self, fail: bool) {
        self.with_state(|s| s.fail_destroy = fail);
    }

    pub fn fail_restart(&self, fail: bool) {
        self.with_state(|s| s.fail_restart = fail);
    }

    /// Fail every `exec` whose command line contains `needle`.
    pub fn fail_exec_containing(&self, needle: &str) {
        self.with_state(|s| s.fail_exec.push(needle.to_owned()));
    }

    pub fn fail_install(&self, package: &str) {
        self.with_state(|s| {
            s.fail_install.insert(package.to_owned());
        });
    }

    pub fn fail_remove(&self, package: &str) {
        self.with_state(|s| {
            s.fail_remove.insert(package.to_owned());
        });
    }

    /// Make `binary_exists` report `name` as absent. Everything else exists.
    pub fn missing_binary(&self, name: &str) {
        self.with_state(|s| {
            s.missing_binaries.insert(name.to_owned());
        });
    }

    pub fn set_search_exit_code(&self, code: i32) {
        self.with_state(|s| s.search_exit_code = code);
    }
}

fn injected(op: &str, id: &str) -> RuntimeError {
    RuntimeError::ExecFailed(format!("mock {op} failed for '{id}'"))
}

impl ContainerDriver for MockDriver {
    fn name(&self) -> &str {
        "mock"
    }

    fn create(&self, spec: &ContainerSpec, _password: Option<&str>) -> Result<(), RuntimeError> {
        let state = self.record(DriverCall::Create {
            id: spec.id.to_string(),
        })?;
        if state.fail_create {
            return Err(injected("create", &spec.id));
        }
        Ok(())
    }

    fn destroy(&self, spec: &ContainerSpec, force: bool) -> Result<(), RuntimeError> {
        let state = self.record(DriverCall::Destroy {
            id: spec.id.to_string(),
            force,
        })?;
        if state.fail_destroy {
            return Err(injected("destroy", &spec.id));
        }
        Ok(())
    }

    fn exec(&self, spec: &ContainerSpec, command: &str) -> Result<(), RuntimeError> {
        let state = self.record(DriverCall::Exec {
            id: spec.id.to_string(),
            command: command.to_owned(),
        })?;
        if state.fail_exec.iter().any(|n| command.contains(n.as_str())) {
            return Err(injected("exec", &spec.id));
        }
        Ok(())
    }

    fn install_package(
        &self,
        spec: &ContainerSpec,
        package: &str,
        _interactive: bool,
        update_cache: bool,
    ) -> Result<(), RuntimeError> {
        let state = self.record(DriverCall::InstallPackage {
            id: spec.id.to_string(),
            package: package.to_owned(),
            update_cache,
        })?;
        if state.fail_install.contains(package) {
            return Err(injected("install", &spec.id));
        }
        Ok(())
    }

    fn remove_package(
        &self,
        spec: &ContainerSpec,
        package: &str,
        _interactive: bool,
    ) -> Result<(), RuntimeError> {
        let state = self.record(DriverCall::RemovePackage {
            id: spec.id.to_string(),
            package: package.to_owned(),
        })?;
        if state.fail_remove.contains(package) {
            return Err(injected("remove", &spec.id));
        }
        Ok(())
    }

    fn restart(&self, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        let state = self.record(DriverCall::Restart {
            id: spec.id.to_string(),
        })?;
        if state.fail_restart {
            return Err(injected("restart", &spec.id));
        }
        Ok(())
    }

    fn binary_exists(&self, spec: &ContainerSpec, name: &str) -> bool {
        self.record(DriverCall::BinaryExists {
            id: spec.id.to_string(),
            name: name.to_owned(),
        })
        .is_ok_and(|s| !s.missing_binaries.contains(name))
    }

    fn search_cache(&self, spec: &ContainerSpec, query: &str) -> Result<i32, RuntimeError> {
        let state = self.record(DriverCall::SearchCache {
            id: spec.id.to_string(),
            query: query.to_owned(),
        })?;
        Ok(state.search_exit_code)
    }
}

/// Host with fixed, test-controlled facts.
#[derive(Debug, Clone)]
pub struct MockHost {
    pub architecture: String,
    pub release: String,
    pub locale: String,
    pub lxc: bool,
    pub lxd: bool,
    pub valid_distros: Vec<String>,
    pub home: Option<PathBuf>,
    pub user: String,
}

impl Default for MockHost {
    fn default() -> Self {
        Self {
            architecture: "amd64".to_owned(),
            release: "jammy".to_owned(),
            locale: "en_US.UTF-8".to_owned(),
            lxc: true,
            lxd: true,
            valid_distros: ["focal", "jammy", "noble"]
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            home: Some(PathBuf::from("/home/tester")),
            user: "tester".to_owned(),
        }
    }
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostInfo for MockHost {
    fn architecture(&self) -> String {
        self.architecture.clone()
    }

    fn distro_release(&self) -> String {
        self.release.clone()
    }

    fn locale(&self) -> String {
        self.locale.clone()
    }

    fn has_lxc_support(&self) -> bool {
        self.lxc
    }

    fn has_lxd_support(&self) -> bool {
        self.lxd
    }

    fn is_distro_valid(&self, name: &str, force: bool) -> bool {
        force || self.valid_distros.iter().any(|d| d == name)
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home.clone()
    }

    fn user_name(&self) -> String {
        self.user.clone()
    }
}

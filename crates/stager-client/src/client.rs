use crate::config::{ClientConfig, ExecOptions};
use crate::coordinator::{self, Coordinator};
use crate::host::{Host, ProcessHost, EXIT_FAILURE, EXIT_SUCCESS};
use crate::metadata::{
    MetaAction, MetaMutation, PackageMetadata, DEFAULT_LEFT_DELIMITER, DEFAULT_RIGHT_DELIMITER,
    START_COMMAND, START_PATH,
};
use crate::shell;
use crate::StagerError;
use sha1::{Digest, Sha1};
use std::ffi::OsStr;
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// One staging run's conversation with the coordinator.
///
/// Fallible operations return `Result`, but an `Err` has already been through
/// [`fail`](Self::fail) by the time the caller sees it: the error line is
/// written, the coordinator notified and the host asked to exit with status 1.
/// [`meta`](Self::meta) and the start accessors are the exception; they report
/// the error and hand it back without terminating.
pub struct StagingClient {
    config: ClientConfig,
    coordinator: Coordinator,
    app_path: Option<PathBuf>,
    host: Box<dyn Host>,
}

impl fmt::Debug for StagingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingClient")
            .field("config", &self.config)
            .field("app_path", &self.app_path)
            .finish_non_exhaustive()
    }
}

impl StagingClient {
    pub fn new(config: ClientConfig) -> Self {
        let coordinator = Coordinator::new(&config);
        Self {
            config,
            coordinator,
            app_path: None,
            host: Box::new(ProcessHost),
        }
    }

    /// Construct from `STAGER_URL` with default paths.
    pub fn from_env() -> Result<Self, StagerError> {
        Ok(Self::new(ClientConfig::from_env()?))
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Host + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn stager_url(&self) -> &str {
        &self.config.stager_url
    }

    pub fn set_root_path(&mut self, root: impl Into<PathBuf>) {
        self.config.root_path = root.into();
    }

    pub fn set_pkg_path(&mut self, path: impl Into<PathBuf>) {
        self.config.pkg_path = path.into();
    }

    pub fn set_updated_pkg_path(&mut self, path: impl Into<PathBuf>) {
        self.config.updated_pkg_path = path.into();
    }

    pub fn set_exec_options(&mut self, exec: ExecOptions) {
        self.config.exec = exec;
    }

    /// Directory the package was last extracted into.
    pub fn app_path(&self) -> Option<&Path> {
        self.app_path.as_deref()
    }

    /// Adopt `<root>/<location>` as the app directory without extracting,
    /// e.g. when a previous process already unpacked it. A missing directory
    /// fails the run like any other operation.
    pub fn set_app_path(&mut self, location: &str) -> Result<&Path, StagerError> {
        let path = self.config.root_path.join(location);
        if !path.is_dir() {
            return self.guard(Err(StagerError::AppPath));
        }
        Ok(self.app_path.insert(path).as_path())
    }

    // --- package ---

    /// Fetch the package archive into the configured package path.
    pub fn download(&self) -> Result<u64, StagerError> {
        let result = self.coordinator.download_to(&self.config.pkg_path);
        if let Ok(bytes) = &result {
            info!(
                "downloaded package to {} ({bytes} bytes)",
                self.config.pkg_path.display()
            );
        }
        self.guard(result)
    }

    /// Unpack the downloaded package into `<root>/<location>` and record it as
    /// the app directory.
    pub fn extract(&mut self, location: &str) -> Result<PathBuf, StagerError> {
        let result = self.try_extract(location);
        if let Ok(dir) = &result {
            info!("extracted package into {}", dir.display());
            self.app_path = Some(dir.clone());
        }
        self.guard(result)
    }

    fn try_extract(&self, location: &str) -> Result<PathBuf, StagerError> {
        let dir = self.config.root_path.join(location);
        fs::create_dir_all(&dir)?;

        let pkg = self.config.pkg_path.to_string_lossy();
        let target = dir.to_string_lossy();
        shell::run_program(
            "tar",
            &["-xzf", &pkg, "-C", &target],
            &format!("tar -xzf {pkg} -C {target}"),
            &self.config.exec,
        )?;
        Ok(dir)
    }

    /// Run `cmd` through the shell.
    pub fn execute(&self, cmd: &str) -> Result<(), StagerError> {
        self.guard(shell::run_shell(cmd, None, &self.config.exec))
    }

    /// Run `cmd` through the shell from inside the app directory.
    pub fn execute_app(&self, cmd: &str) -> Result<(), StagerError> {
        let result = self
            .require_app_path()
            .and_then(|dir| shell::run_shell(cmd, Some(dir), &self.config.exec));
        self.guard(result)
    }

    /// Archive the app directory, hash it and send it to the coordinator.
    /// Returns the SHA-1 the upload was tagged with.
    pub fn upload(&self) -> Result<String, StagerError> {
        self.guard(self.try_upload())
    }

    fn try_upload(&self) -> Result<String, StagerError> {
        let dir = self.require_app_path()?;
        let (parent, name) = match (dir.parent(), dir.file_name()) {
            (Some(parent), Some(name)) => (parent, name),
            _ => (dir, OsStr::new(".")),
        };

        let archive = self.config.updated_pkg_path.to_string_lossy();
        let parent = parent.to_string_lossy();
        let name = name.to_string_lossy();
        shell::run_program(
            "tar",
            &["-czf", &archive, "-C", &parent, &name],
            &format!("tar -czf {archive} -C {parent} {name}"),
            &self.config.exec,
        )?;

        let sha1 = file_sha1(&self.config.updated_pkg_path)?;
        self.coordinator
            .upload(&self.config.updated_pkg_path, &sha1)?;
        info!("uploaded rebuilt package (sha1 {sha1})");
        Ok(sha1)
    }

    /// Ask the coordinator to snapshot the staging filesystem.
    pub fn snapshot(&self) -> Result<(), StagerError> {
        self.guard(self.coordinator.signal(coordinator::SNAPSHOT))
    }

    // --- metadata ---

    /// Fetch the metadata document. Errors are reported and returned, not
    /// escalated to [`fail`](Self::fail).
    pub fn meta(&self) -> Result<PackageMetadata, StagerError> {
        self.coordinator.fetch_meta().inspect_err(|err| {
            error!("metadata fetch failed: {err}");
            self.host.error_line(&format!("Error: {err}."));
        })
    }

    pub fn metadata(&self) -> Result<PackageMetadata, StagerError> {
        self.meta()
    }

    pub fn environment_add(&self, key: &str, value: &str) -> Result<(), StagerError> {
        self.mutate(&MetaMutation::Environment {
            action: MetaAction::Add,
            key: key.to_owned(),
            value: Some(value.to_owned()),
        })
    }

    pub fn environment_remove(&self, key: &str) -> Result<(), StagerError> {
        self.mutate(&MetaMutation::Environment {
            action: MetaAction::Remove,
            key: key.to_owned(),
            value: None,
        })
    }

    pub fn provides_add(&self, kind: &str, name: &str) -> Result<(), StagerError> {
        self.mutate(&MetaMutation::Provides {
            action: MetaAction::Add,
            kind: kind.to_owned(),
            name: name.to_owned(),
        })
    }

    pub fn provides_remove(&self, kind: &str, name: &str) -> Result<(), StagerError> {
        self.mutate(&MetaMutation::Provides {
            action: MetaAction::Remove,
            kind: kind.to_owned(),
            name: name.to_owned(),
        })
    }

    /// Add a dependency unless the package already has it. Returns whether a
    /// request was sent.
    pub fn dependencies_add(&self, kind: &str, name: &str) -> Result<bool, StagerError> {
        self.guard(self.try_dependency(MetaAction::Add, kind, name))
    }

    /// Remove a dependency if the package has it. Returns whether a request
    /// was sent.
    pub fn dependencies_remove(&self, kind: &str, name: &str) -> Result<bool, StagerError> {
        self.guard(self.try_dependency(MetaAction::Remove, kind, name))
    }

    fn try_dependency(
        &self,
        action: MetaAction,
        kind: &str,
        name: &str,
    ) -> Result<bool, StagerError> {
        let present = self.coordinator.fetch_meta()?.has_dependency(kind, name);
        let wanted = action == MetaAction::Add;
        if present == wanted {
            info!("dependency {kind}:{name} already in requested state, skipping");
            return Ok(false);
        }
        self.coordinator.mutate(&MetaMutation::Dependencies {
            action,
            kind: kind.to_owned(),
            name: name.to_owned(),
        })?;
        Ok(true)
    }

    /// Register a template. `None` delimiters default to `{{` and `}}`.
    pub fn templates_add(
        &self,
        path: &str,
        left_delimiter: Option<&str>,
        right_delimiter: Option<&str>,
    ) -> Result<(), StagerError> {
        self.mutate(&template_mutation(
            MetaAction::Add,
            path,
            left_delimiter,
            right_delimiter,
        ))
    }

    pub fn templates_remove(
        &self,
        path: &str,
        left_delimiter: Option<&str>,
        right_delimiter: Option<&str>,
    ) -> Result<(), StagerError> {
        self.mutate(&template_mutation(
            MetaAction::Remove,
            path,
            left_delimiter,
            right_delimiter,
        ))
    }

    pub fn start_command(&self) -> Result<Option<String>, StagerError> {
        Ok(self.meta()?.start_command().map(str::to_owned))
    }

    pub fn set_start_command(&self, value: &str) -> Result<(), StagerError> {
        self.environment_add(START_COMMAND, value)
    }

    pub fn start_path(&self) -> Result<Option<String>, StagerError> {
        Ok(self.meta()?.start_path().map(str::to_owned))
    }

    pub fn set_start_path(&self, value: &str) -> Result<(), StagerError> {
        self.environment_add(START_PATH, value)
    }

    fn mutate(&self, mutation: &MetaMutation) -> Result<(), StagerError> {
        self.guard(self.coordinator.mutate(mutation))
    }

    // --- terminal outcomes ---

    /// Report success and exit with status 0.
    pub fn done(&self) -> Result<(), StagerError> {
        self.finish(coordinator::DONE)
    }

    /// Ask the coordinator to relaunch staging and exit with status 0.
    pub fn relaunch(&self) -> Result<(), StagerError> {
        self.finish(coordinator::RELAUNCH)
    }

    /// Upload the rebuilt package, then [`done`](Self::done). A failed upload
    /// never reaches `done`.
    pub fn complete(&self) -> Result<(), StagerError> {
        self.upload()?;
        self.done()
    }

    fn finish(&self, endpoint: &str) -> Result<(), StagerError> {
        self.guard(self.coordinator.signal(endpoint))?;
        info!("staging finished: {endpoint}");
        self.host.exit(EXIT_SUCCESS);
        Ok(())
    }

    /// Report `error` (if any), tell the coordinator staging failed and exit
    /// with status 1. Never returns an error; a failed notification is only
    /// reported.
    pub fn fail(&self, error: Option<&dyn fmt::Display>) {
        if let Some(err) = error {
            error!("staging failed: {err}");
            self.host.error_line(&format!("Error: {err}."));
        }
        if let Err(e) = self.coordinator.signal(coordinator::FAILED) {
            warn!("could not notify coordinator of failure: {e}");
            self.host.error_line(&format!("Error: {e}."));
        }
        self.host.exit(EXIT_FAILURE);
    }

    /// Write a line to the output stream.
    pub fn output(&self, text: &str) {
        self.host.output_line(text);
    }

    fn guard<T>(&self, result: Result<T, StagerError>) -> Result<T, StagerError> {
        if let Err(err) = &result {
            self.fail(Some(err));
        }
        result
    }

    fn require_app_path(&self) -> Result<&Path, StagerError> {
        self.app_path.as_deref().ok_or(StagerError::AppPath)
    }
}

fn template_mutation(
    action: MetaAction,
    path: &str,
    left: Option<&str>,
    right: Option<&str>,
) -> MetaMutation {
    MetaMutation::Templates {
        action,
        path: path.to_owned(),
        left_delimiter: left.unwrap_or(DEFAULT_LEFT_DELIMITER).to_owned(),
        right_delimiter: right.unwrap_or(DEFAULT_RIGHT_DELIMITER).to_owned(),
    }
}

/// Hex SHA-1 of a file, streamed.
pub fn file_sha1(path: &Path) -> Result<String, StagerError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

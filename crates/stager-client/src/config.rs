use crate::StagerError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable consulted when no coordinator URL is passed explicitly.
pub const STAGER_URL_ENV: &str = "STAGER_URL";

pub const DEFAULT_ROOT: &str = "/tmp";
pub const PKG_NAME: &str = "pkg.tar.gz";
pub const UPDATED_PKG_NAME: &str = "updated.tar.gz";

/// Where a child process stream goes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Redirect {
    #[default]
    Inherit,
    Null,
    /// Append to the given file, creating it if needed.
    File(PathBuf),
}

/// Options applied to every command the client runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOptions {
    #[serde(default)]
    pub stdout: Redirect,
    #[serde(default)]
    pub stderr: Redirect,
    /// Variables stripped from the child environment before it starts.
    #[serde(default)]
    pub env_remove: Vec<String>,
}

impl ExecOptions {
    /// Discard both output streams.
    pub fn quiet() -> Self {
        Self {
            stdout: Redirect::Null,
            stderr: Redirect::Null,
            env_remove: Vec::new(),
        }
    }
}

/// Everything a [`StagingClient`](crate::StagingClient) needs, fixed at construction.
///
/// Paths may be overridden before the first operation runs, mostly so tests can
/// point the client at a scratch directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub stager_url: String,
    pub root_path: PathBuf,
    pub pkg_path: PathBuf,
    pub updated_pkg_path: PathBuf,
    #[serde(default)]
    pub exec: ExecOptions,
    /// Whole-request timeout handed to the HTTP transport. `None` waits forever.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl ClientConfig {
    /// Build a config from an explicit URL, falling back to `STAGER_URL`.
    pub fn new(stager_url: Option<&str>) -> Result<Self, StagerError> {
        let url = resolve_url(stager_url, std::env::var(STAGER_URL_ENV).ok())?;
        Ok(Self::with_url(&url))
    }

    pub fn from_env() -> Result<Self, StagerError> {
        Self::new(None)
    }

    fn with_url(url: &str) -> Self {
        let root = PathBuf::from(DEFAULT_ROOT);
        Self {
            stager_url: url.to_owned(),
            pkg_path: root.join(PKG_NAME),
            updated_pkg_path: root.join(UPDATED_PKG_NAME),
            root_path: root,
            exec: ExecOptions::default(),
            request_timeout_secs: None,
        }
    }

    /// Move the root and re-derive both archive paths beneath it.
    #[must_use]
    pub fn with_root(mut self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        self.root_path = root.to_path_buf();
        self.pkg_path = root.join(PKG_NAME);
        self.updated_pkg_path = root.join(UPDATED_PKG_NAME);
        self
    }

    #[must_use]
    pub fn with_exec(mut self, exec: ExecOptions) -> Self {
        self.exec = exec;
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }
}

fn resolve_url(explicit: Option<&str>, from_env: Option<String>) -> Result<String, StagerError> {
    explicit
        .map(str::to_owned)
        .or(from_env)
        .filter(|url| !url.trim().is_empty())
        .ok_or(StagerError::Configuration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_url_wins_over_environment() {
        let url = resolve_url(
            Some("http://explicit.test"),
            Some("http://env.test".to_owned()),
        )
        .unwrap();
        assert_eq!(url, "http://explicit.test");
    }

    #[test]
    fn environment_url_used_as_fallback() {
        let url = resolve_url(None, Some("http://env.test".to_owned())).unwrap();
        assert_eq!(url, "http://env.test");
    }

    #[test]
    fn missing_url_is_configuration_error() {
        assert!(matches!(
            resolve_url(None, None),
            Err(StagerError::Configuration)
        ));
        assert!(matches!(
            resolve_url(Some("  "), None),
            Err(StagerError::Configuration)
        ));
    }

    #[test]
    fn default_paths_live_under_default_root() {
        let config = ClientConfig::with_url("http://example.com/");
        assert_eq!(config.stager_url, "http://example.com");
        assert_eq!(config.root_path, PathBuf::from("/tmp"));
        assert_eq!(config.pkg_path, PathBuf::from("/tmp/pkg.tar.gz"));
        assert_eq!(config.updated_pkg_path, PathBuf::from("/tmp/updated.tar.gz"));
        assert_eq!(config.exec, ExecOptions::default());
    }

    #[test]
    fn with_root_rederives_archive_paths() {
        let config = ClientConfig::with_url("http://example.com").with_root("/srv/stage");
        assert_eq!(config.pkg_path, PathBuf::from("/srv/stage/pkg.tar.gz"));
        assert_eq!(
            config.updated_pkg_path,
            PathBuf::from("/srv/stage/updated.tar.gz")
        );
    }

    #[test]
    fn url_is_kept_as_given() {
        let config = ClientConfig::new(Some("http://example.com/stager/")).unwrap();
        assert_eq!(config.stager_url, "http://example.com/stager/");
    }

    #[test]
    fn config_json_roundtrip_keeps_redirects() {
        let config = ClientConfig::with_url("http://example.com").with_exec(ExecOptions {
            stdout: Redirect::Null,
            stderr: Redirect::File(PathBuf::from("/tmp/build.log")),
            env_remove: vec!["BUNDLE_GEMFILE".to_owned()],
        });
        let json = serde_json::to_string(&config).unwrap();
        let back: ClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}

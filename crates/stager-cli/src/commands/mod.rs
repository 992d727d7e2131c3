pub mod metadata;
pub mod outcome;
pub mod package;

use stager_client::{ClientConfig, ExecOptions, StagingClient};
use std::path::Path;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;

/// Global flags that shape the client.
pub struct ClientArgs<'a> {
    pub url: Option<&'a str>,
    pub root: Option<&'a Path>,
    pub quiet: bool,
}

impl ClientArgs<'_> {
    pub fn build(&self) -> Result<StagingClient, String> {
        let mut config = ClientConfig::new(self.url).map_err(|e| e.to_string())?;
        if let Some(root) = self.root {
            config = config.with_root(root);
        }
        if self.quiet {
            config = config.with_exec(ExecOptions::quiet());
        }
        Ok(StagingClient::new(config))
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

/// Reuse a directory unpacked by an earlier `stager extract`. A missing
/// directory is reported and the run failed through the client.
pub fn adopt_location(client: &mut StagingClient, location: &str) -> Result<(), String> {
    client
        .set_app_path(location)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_url() {
        let args = ClientArgs {
            url: None,
            root: None,
            quiet: false,
        };
        // STAGER_URL may be set by the caller's environment; only assert when absent.
        if std::env::var("STAGER_URL").is_err() {
            assert!(args.build().is_err());
        }
    }

    #[test]
    fn build_applies_root_and_quiet() {
        let args = ClientArgs {
            url: Some("http://example.com"),
            root: Some(Path::new("/srv/stage")),
            quiet: true,
        };
        let client = args.build().unwrap();
        assert_eq!(
            client.config().pkg_path,
            Path::new("/srv/stage/pkg.tar.gz")
        );
        assert_eq!(client.config().exec, ExecOptions::quiet());
    }

    #[test]
    fn json_pretty_serializes_document() {
        let doc = stager_client::PackageMetadata::default();
        let out = json_pretty(&doc).unwrap();
        assert!(out.contains("\"environment\""));
    }
}

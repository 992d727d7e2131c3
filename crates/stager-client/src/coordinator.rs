use crate::config::ClientConfig;
use crate::metadata::{MetaMutation, PackageMetadata};
use crate::StagerError;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

pub const DATA: &str = "data";
pub const META: &str = "meta";
pub const SNAPSHOT: &str = "snapshot";
pub const DONE: &str = "done";
pub const RELAUNCH: &str = "relaunch";
pub const FAILED: &str = "failed";

/// Blocking HTTP transport for the Staging Coordinator.
///
/// Endpoints, relative to the configured base URL:
/// - `GET  /data`             package archive (streamed)
/// - `POST /data?sha1=<hex>`  rebuilt archive
/// - `GET  /meta`             metadata document (JSON)
/// - `PUT  /meta`             one [`MetaMutation`] (JSON)
/// - `POST /snapshot`, `/done`, `/relaunch`, `/failed`
pub struct Coordinator {
    base: String,
    agent: ureq::Agent,
}

impl Coordinator {
    pub fn new(config: &ClientConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(config.request_timeout_secs.map(Duration::from_secs))
            .build()
            .into();
        Self {
            base: config.stager_url.trim_end_matches('/').to_owned(),
            agent,
        }
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base)
    }

    /// Stream the package archive into `dest`, replacing any existing file.
    /// Returns the number of bytes written.
    pub fn download_to(&self, dest: &Path) -> Result<u64, StagerError> {
        let url = self.url(DATA);
        tracing::debug!("GET {url}");
        let resp = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| StagerError::PackageDownload(describe(&url, &e)))?;

        let mut reader = resp.into_body().into_reader();
        let written = File::create(dest).and_then(|mut file| io::copy(&mut reader, &mut file));
        match written {
            Ok(bytes) => {
                tracing::debug!("wrote {bytes} bytes to {}", dest.display());
                Ok(bytes)
            }
            Err(e) => {
                let _ = std::fs::remove_file(dest);
                Err(StagerError::PackageDownload(format!(
                    "writing {}: {e}",
                    dest.display()
                )))
            }
        }
    }

    /// Stream `archive` to the coordinator, tagged with its SHA-1.
    pub fn upload(&self, archive: &Path, sha1: &str) -> Result<(), StagerError> {
        let url = format!("{}?sha1={sha1}", self.url(DATA));
        let mut file = File::open(archive)?;
        tracing::debug!("POST {url} ({})", archive.display());
        self.agent
            .post(&url)
            .header("Content-Type", "application/octet-stream")
            .send(ureq::SendBody::from_reader(&mut file))
            .map_err(|e| coordinator_error(DATA, &url, &e))?;
        Ok(())
    }

    pub fn fetch_meta(&self) -> Result<PackageMetadata, StagerError> {
        let url = self.url(META);
        tracing::debug!("GET {url}");
        let resp = self
            .agent
            .get(&url)
            .header("Accept", "application/json")
            .call()
            .map_err(|e| StagerError::PackageMetadata(describe(&url, &e)))?;

        let mut body = Vec::new();
        resp.into_body()
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| StagerError::PackageMetadata(e.to_string()))?;
        serde_json::from_slice(&body)
            .map_err(|e| StagerError::PackageMetadata(format!("invalid metadata document: {e}")))
    }

    pub fn mutate(&self, mutation: &MetaMutation) -> Result<(), StagerError> {
        let url = self.url(META);
        let body = serde_json::to_vec(mutation).map_err(|e| StagerError::Coordinator {
            endpoint: META.to_owned(),
            reason: e.to_string(),
        })?;
        tracing::debug!("PUT {url} ({} {:?})", mutation.resource(), mutation.action());
        self.agent
            .put(&url)
            .header("Content-Type", "application/json")
            .send(body.as_slice())
            .map_err(|e| coordinator_error(META, &url, &e))?;
        Ok(())
    }

    /// Empty POST to one of the signal endpoints.
    pub fn signal(&self, endpoint: &str) -> Result<(), StagerError> {
        let url = self.url(endpoint);
        tracing::debug!("POST {url}");
        self.agent
            .post(&url)
            .send_empty()
            .map_err(|e| coordinator_error(endpoint, &url, &e))?;
        Ok(())
    }
}

fn describe(url: &str, err: &ureq::Error) -> String {
    match err {
        ureq::Error::StatusCode(code) => format!("HTTP {code} for {url}"),
        other => format!("{url}: {other}"),
    }
}

fn coordinator_error(endpoint: &str, url: &str, err: &ureq::Error) -> StagerError {
    StagerError::Coordinator {
        endpoint: endpoint.to_owned(),
        reason: describe(url, err),
    }
}

//! Client library for an application-staging agent.
//!
//! A staging run talks to a remote Staging Coordinator: it downloads the
//! application package, unpacks it, runs build commands against it, edits the
//! package metadata (environment, provides, dependencies, templates), uploads
//! the rebuilt package and reports exactly one terminal outcome (done,
//! relaunch or failed). [`StagingClient`] owns that conversation.
//!
//! Every operation that can fail is funneled into [`StagingClient::fail`],
//! which reports the error, notifies the coordinator best-effort and ends the
//! process through the [`Host`] seam with status 1.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod host;
pub mod metadata;
pub mod shell;

pub use client::StagingClient;
pub use config::{ClientConfig, ExecOptions, Redirect, STAGER_URL_ENV};
pub use coordinator::Coordinator;
pub use host::{Host, ProcessHost, Recording, RecordingHost, EXIT_FAILURE, EXIT_SUCCESS};
pub use metadata::{MetaAction, MetaMutation, PackageMetadata, Resource, Template};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StagerError {
    #[error("stager url required (pass one explicitly or set {STAGER_URL_ENV})")]
    Configuration,
    #[error("package download failed: {0}")]
    PackageDownload(String),
    #[error("failed to execute: {command}")]
    Execution { command: String },
    #[error("app path not set, please run extract")]
    AppPath,
    #[error("package metadata unavailable: {0}")]
    PackageMetadata(String),
    #[error("coordinator request to {endpoint} failed: {reason}")]
    Coordinator { endpoint: String, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_error_carries_command_text() {
        let err = StagerError::Execution {
            command: "cat thing".to_owned(),
        };
        assert_eq!(err.to_string(), "failed to execute: cat thing");
    }

    #[test]
    fn configuration_error_names_environment_variable() {
        assert!(StagerError::Configuration
            .to_string()
            .contains(STAGER_URL_ENV));
    }
}

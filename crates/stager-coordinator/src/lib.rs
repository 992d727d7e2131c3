//! Reference Staging Coordinator.
//!
//! Serves one package and one metadata document to a staging agent and records
//! what the agent sends back: rebuilt uploads, metadata mutations and lifecycle
//! signals. State is in memory; the binary can seed it from files.
//!
//! The [`TestServer`] helper starts a coordinator on a random port for
//! integration testing.

use sha1::{Digest, Sha1};
use stager_client::{MetaMutation, PackageMetadata};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("coordinator I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error("invalid metadata document: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// A lifecycle signal posted by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Snapshot,
    Done,
    Relaunch,
    Failed,
}

impl Signal {
    fn from_path(path: &str) -> Option<Self> {
        match path {
            "/snapshot" => Some(Self::Snapshot),
            "/done" => Some(Self::Done),
            "/relaunch" => Some(Self::Relaunch),
            "/failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub sha1: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
}

#[derive(Debug, Default)]
struct State {
    package: Option<Vec<u8>>,
    metadata: PackageMetadata,
    uploads: Vec<Upload>,
    mutations: Vec<MetaMutation>,
    signals: Vec<Signal>,
    requests: Vec<RecordedRequest>,
    faults: HashMap<String, u16>,
}

/// Coordinator state plus the request handler.
#[derive(Debug, Default)]
pub struct StagingCoordinator {
    state: Mutex<State>,
}

impl StagingCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_package(self, data: Vec<u8>) -> Self {
        self.lock().package = Some(data);
        self
    }

    #[must_use]
    pub fn with_metadata(self, metadata: PackageMetadata) -> Self {
        self.lock().metadata = metadata;
        self
    }

    /// Answer every request to `path` (query string ignored) with `status`.
    #[must_use]
    pub fn with_fault(self, path: &str, status: u16) -> Self {
        self.lock().faults.insert(path.to_owned(), status);
        self
    }

    pub fn metadata(&self) -> PackageMetadata {
        self.lock().metadata.clone()
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.lock().uploads.clone()
    }

    /// Mutations that reached the document, in arrival order.
    pub fn mutations(&self) -> Vec<MetaMutation> {
        self.lock().mutations.clone()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.lock().signals.clone()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self, method: &str, path: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle a single HTTP request, dispatching on method and path.
    pub fn handle_request(&self, mut req: tiny_http::Request) {
        let method = req.method().clone();
        let url = req.url().to_owned();
        let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));
        debug!("{method} {url}");

        let fault = {
            let mut state = self.lock();
            state.requests.push(RecordedRequest {
                method: method.to_string(),
                path: path.to_owned(),
            });
            state.faults.get(path).copied()
        };
        if let Some(code) = fault {
            warn!("{method} {path}: injected {code}");
            respond_text(req, code, "injected fault");
            return;
        }

        match (&method, path) {
            (Method::Get, "/data") => {
                let package = self.lock().package.clone();
                match package {
                    Some(data) => respond_octet(req, data),
                    None => respond_text(req, 404, "no package"),
                }
            }
            (Method::Post, "/data") => {
                let expected = query_param(query, "sha1").map(str::to_owned);
                let Some(body) = read_body(&mut req) else {
                    respond_text(req, 500, "read error");
                    return;
                };
                self.receive_upload(req, expected, body);
            }
            (Method::Get, "/meta") => {
                let doc = self.metadata();
                match serde_json::to_vec(&doc) {
                    Ok(json) => respond_json(req, json),
                    Err(e) => respond_text(req, 500, &e.to_string()),
                }
            }
            (Method::Put | Method::Post, "/meta") => {
                let Some(body) = read_body(&mut req) else {
                    respond_text(req, 500, "read error");
                    return;
                };
                self.receive_mutation(req, &body);
            }
            (Method::Post, _) if Signal::from_path(path).is_some() => {
                if let Some(signal) = Signal::from_path(path) {
                    info!("signal: {signal:?}");
                    self.lock().signals.push(signal);
                }
                respond_text(req, 200, "OK");
            }
            (Method::Get, "/health") => respond_json(req, br#"{"status":"ok"}"#.to_vec()),
            (_, "/data" | "/meta" | "/snapshot" | "/done" | "/relaunch" | "/failed") => {
                respond_text(req, 405, "method not allowed");
            }
            _ => respond_text(req, 404, "not found"),
        }
    }

    fn receive_upload(&self, req: tiny_http::Request, expected: Option<String>, body: Vec<u8>) {
        let Some(expected) = expected else {
            respond_text(req, 400, "sha1 query parameter required");
            return;
        };
        let actual = format!("{:x}", Sha1::digest(&body));
        if !actual.eq_ignore_ascii_case(&expected) {
            warn!("upload rejected: expected sha1 {expected}, got {actual}");
            respond_text(req, 400, "sha1 mismatch");
            return;
        }
        info!("upload accepted: {} bytes, sha1 {actual}", body.len());
        self.lock().uploads.push(Upload {
            sha1: actual,
            data: body,
        });
        respond_text(req, 200, "OK");
    }

    fn receive_mutation(&self, req: tiny_http::Request, body: &[u8]) {
        let mutation: MetaMutation = match serde_json::from_slice(body) {
            Ok(m) => m,
            Err(e) => {
                respond_text(req, 400, &format!("invalid mutation: {e}"));
                return;
            }
        };
        let changed = {
            let mut state = self.lock();
            let changed = state.metadata.apply(&mutation);
            state.mutations.push(mutation);
            changed
        };
        debug!("metadata mutation applied (changed: {changed})");
        respond_json(req, format!(r#"{{"changed":{changed}}}"#).into_bytes());
    }
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

fn respond_text(req: tiny_http::Request, code: u16, msg: &str) {
    let _ = req.respond(Response::from_string(msg).with_status_code(StatusCode(code)));
}

fn respond_octet(req: tiny_http::Request, data: Vec<u8>) {
    let header =
        Header::from_bytes("Content-Type", "application/octet-stream").expect("valid header");
    let _ = req.respond(Response::from_data(data).with_header(header));
}

fn respond_json(req: tiny_http::Request, json: Vec<u8>) {
    let header = Header::from_bytes("Content-Type", "application/json").expect("valid header");
    let _ = req.respond(Response::from_data(json).with_header(header));
}

fn read_body(req: &mut tiny_http::Request) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    req.as_reader().read_to_end(&mut body).ok().map(|_| body)
}

/// Start the server loop, blocking the current thread.
pub fn run_server(coordinator: &StagingCoordinator, addr: &str) -> Result<(), CoordinatorError> {
    let server = Server::http(addr).map_err(|e| CoordinatorError::Bind {
        addr: addr.to_owned(),
        reason: e.to_string(),
    })?;
    for request in server.incoming_requests() {
        coordinator.handle_request(request);
    }
    Ok(())
}

/// A coordinator running on a random local port in a background thread.
///
/// Dropping it unblocks and joins the server thread.
pub struct TestServer {
    pub url: String,
    pub port: u16,
    pub coordinator: Arc<StagingCoordinator>,
    server: Arc<Server>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl TestServer {
    /// Binds to `127.0.0.1:0`.
    pub fn start(coordinator: StagingCoordinator) -> Self {
        let server =
            Arc::new(Server::http("127.0.0.1:0").expect("failed to bind test HTTP server"));
        let port = server.server_addr().to_ip().expect("not an IP addr").port();
        let url = format!("http://127.0.0.1:{port}");

        let coordinator = Arc::new(coordinator);
        let srv = Arc::clone(&server);
        let state = Arc::clone(&coordinator);
        let handle = std::thread::spawn(move || {
            for request in srv.incoming_requests() {
                state.handle_request(request);
            }
        });

        Self {
            url,
            port,
            coordinator,
            server,
            handle: Some(handle),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_param_lookup() {
        assert_eq!(query_param("sha1=abc&x=1", "sha1"), Some("abc"));
        assert_eq!(query_param("x=1&sha1=def", "sha1"), Some("def"));
        assert_eq!(query_param("", "sha1"), None);
        assert_eq!(query_param("sha1", "sha1"), None);
    }

    #[test]
    fn signal_paths() {
        assert_eq!(Signal::from_path("/done"), Some(Signal::Done));
        assert_eq!(Signal::from_path("/failed"), Some(Signal::Failed));
        assert_eq!(Signal::from_path("/meta"), None);
    }

    #[test]
    fn builder_seeds_state() {
        let mut doc = PackageMetadata::default();
        doc.environment
            .insert("START_PATH".to_owned(), "/app".to_owned());
        let c = StagingCoordinator::new()
            .with_package(b"pkg".to_vec())
            .with_metadata(doc.clone())
            .with_fault("/done", 500);

        assert_eq!(c.metadata(), doc);
        assert_eq!(c.lock().package.as_deref(), Some(&b"pkg"[..]));
        assert_eq!(c.lock().faults.get("/done"), Some(&500));
        assert!(c.signals().is_empty());
    }
}

//! Process-level side effects: exit, error lines, output lines.
//!
//! The client never calls `std::process::exit` directly. Production wiring uses
//! [`ProcessHost`]; tests use [`RecordingHost`] so a terminal outcome can be
//! observed without ending the test process.

use std::sync::{Arc, Mutex, PoisonError};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

pub trait Host: Send {
    /// End the run with `code`. Real hosts do not return.
    fn exit(&self, code: i32);

    /// Write one line to the error stream.
    fn error_line(&self, text: &str) {
        eprintln!("{text}");
    }

    /// Write one line to the output stream.
    fn output_line(&self, text: &str) {
        println!("{text}");
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessHost;

impl Host for ProcessHost {
    fn exit(&self, code: i32) {
        tracing::debug!("exiting with status {code}");
        std::process::exit(code);
    }
}

/// Everything a [`RecordingHost`] observed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Recording {
    pub exit_codes: Vec<i32>,
    pub errors: Vec<String>,
    pub output: Vec<String>,
}

/// A host that records instead of acting. Clones share one recording.
#[derive(Debug, Default, Clone)]
pub struct RecordingHost {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Recording {
        self.lock().clone()
    }

    pub fn exit_codes(&self) -> Vec<i32> {
        self.lock().exit_codes.clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lock().errors.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recording> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Host for RecordingHost {
    fn exit(&self, code: i32) {
        self.lock().exit_codes.push(code);
    }

    fn error_line(&self, text: &str) {
        self.lock().errors.push(text.to_owned());
    }

    fn output_line(&self, text: &str) {
        self.lock().output.push(text.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_recording() {
        let host = RecordingHost::new();
        let boxed: Box<dyn Host> = Box::new(host.clone());
        boxed.error_line("Error: boom.");
        boxed.output_line("hello");
        boxed.exit(EXIT_FAILURE);

        let rec = host.snapshot();
        assert_eq!(rec.exit_codes, vec![1]);
        assert_eq!(rec.errors, vec!["Error: boom."]);
        assert_eq!(rec.output, vec!["hello"]);
    }
}

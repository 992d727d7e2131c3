//! Running commands on behalf of the staging script.
//!
//! Command strings are handed to `sh -c` as-is. Quoting and safety are the
//! caller's responsibility; this module does not sandbox anything.

use crate::config::{ExecOptions, Redirect};
use crate::StagerError;
use std::fs::OpenOptions;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Run `cmd` through the shell, optionally inside `dir`.
pub fn run_shell(cmd: &str, dir: Option<&Path>, opts: &ExecOptions) -> Result<(), StagerError> {
    let mut command = Command::new("sh");
    command.arg("-c").arg(cmd);
    run(command, cmd, dir, opts)
}

/// Run a program with explicit arguments, bypassing the shell. `shown` is the
/// text reported if it fails.
pub fn run_program(
    program: &str,
    args: &[&str],
    shown: &str,
    opts: &ExecOptions,
) -> Result<(), StagerError> {
    let mut command = Command::new(program);
    command.args(args);
    run(command, shown, None, opts)
}

fn run(
    mut command: Command,
    shown: &str,
    dir: Option<&Path>,
    opts: &ExecOptions,
) -> Result<(), StagerError> {
    if let Some(dir) = dir {
        command.current_dir(dir);
    }
    for var in &opts.env_remove {
        command.env_remove(var);
    }
    command
        .stdin(Stdio::null())
        .stdout(stdio_for(&opts.stdout)?)
        .stderr(stdio_for(&opts.stderr)?);

    debug!("exec: {shown}");
    let status = command.status().map_err(|e| {
        warn!("could not start '{shown}': {e}");
        StagerError::Execution {
            command: shown.to_owned(),
        }
    })?;

    if status.success() {
        Ok(())
    } else {
        warn!("'{shown}' exited with {status}");
        Err(StagerError::Execution {
            command: shown.to_owned(),
        })
    }
}

fn stdio_for(redirect: &Redirect) -> Result<Stdio, StagerError> {
    Ok(match redirect {
        Redirect::Inherit => Stdio::inherit(),
        Redirect::Null => Stdio::null(),
        Redirect::File(path) => OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?
            .into(),
    })
}

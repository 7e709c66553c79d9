// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External process invocation.
//!
//! Every external tool grafship leans on (git, jsonnet, jq) is run through
//! [`syscall_non_interactive`]. Standard output is handed back untouched,
//! because callers like the jsonnet renderer need it byte for byte. Standard
//! error is only kept around to explain failures.

use std::{
    ffi::{OsStr, OsString},
    process::{ExitStatus, Stdio},
    time::Duration,
};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Run external command to completion, capturing its standard output.
///
/// The child is killed if it does not finish within `timeout`.
///
/// # Errors
///
/// - Return [`SyscallError::Spawn`] if the command cannot be started.
/// - Return [`SyscallError::Timeout`] if the command outlives `timeout`.
/// - Return [`SyscallError::Failed`] if the command exits non-zero.
#[instrument(skip(cmd, args), level = "debug")]
pub async fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let program = cmd.as_ref().to_os_string();
    let mut command = Command::new(&program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    debug!("run {:?}", command.as_std());

    let output = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| SyscallError::Timeout {
            program: program.clone(),
            timeout,
        })?
        .map_err(|err| SyscallError::Spawn {
            source: err,
            program: program.clone(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();

        // INVARIANT: Chomp trailing newlines.
        let stderr = stderr
            .strip_suffix("\r\n")
            .or(stderr.strip_suffix('\n'))
            .map(ToString::to_string)
            .unwrap_or(stderr);

        return Err(SyscallError::Failed {
            program,
            status: output.status,
            stderr,
        });
    }

    Ok(output.stdout)
}

/// External process error types.
#[derive(Debug, thiserror::Error)]
pub enum SyscallError {
    /// Command could not be started at all.
    #[error("failed to run command {program:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        program: OsString,
    },

    /// Command ran past its deadline and was killed.
    #[error("command {program:?} timed out after {timeout:?}")]
    Timeout { program: OsString, timeout: Duration },

    /// Command exited unsuccessfully.
    #[error("command {program:?} failed with {status}:\n{stderr}")]
    Failed {
        program: OsString,
        status: ExitStatus,
        stderr: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = SyscallError> = std::result::Result<T, E>;

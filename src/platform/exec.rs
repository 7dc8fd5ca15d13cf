//! Remote command execution interface.
//!
//! Commands run inside a container's network namespace. Implementations own
//! timeouts and cancellation; a call always returns a result or an error.
//! Nothing here retries.

use crate::platform::cluster::ContainerRef;
use crate::NetCheckError;

/// Captured output of a remote command that exited successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

pub trait RemoteExecutor: Send + Sync {
    /// Run `command` in the network namespace of `target`.
    ///
    /// A launch failure or non-zero exit status is an error. Output written
    /// to stderr by a successful command is returned for the caller to judge.
    fn exec(&self, command: &str, target: &ContainerRef) -> Result<ExecOutput, NetCheckError>;
}

/// Run a command and treat anything on stderr as a failure.
///
/// Returns stdout on success.
pub fn exec_checked(
    executor: &dyn RemoteExecutor,
    command: &str,
    target: &ContainerRef,
) -> Result<String, NetCheckError> {
    let output = executor.exec(command, target)?;
    let stderr = output.stderr.trim();
    if !stderr.is_empty() {
        return Err(NetCheckError::RemoteExecution {
            command: command.to_string(),
            target: target.to_string(),
            message: format!("stderr: {}", stderr),
        });
    }
    Ok(output.stdout)
}

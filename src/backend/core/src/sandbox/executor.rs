//! Sandboxed plugin execution.
//!
//! [`ContainerExecutor`] runs one fresh, uniquely named container per
//! request: spawn, feed the request bytes on stdin, collect stdout and
//! stderr, wait for exit, check the response parses. Request and response
//! bytes cross the boundary unchanged. Processes are never pooled or reused.
//!
//! Cancellation, the configured deadline and pipe failures remove the
//! container through the runtime (`rm -f`) and then kill and reap the client.
//! A dropped future schedules the same removal.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::command::ContainerInvocation;
use super::protocol;
use crate::catalog::PluginRecord;
use crate::config::SandboxSettings;

// ═══════════════════════════════════════════════════════════════════════════════
// Execution Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("plugin execution failed: {status}, stderr: {stderr}")]
    Exited { status: ExitStatus, stderr: String },

    #[error("plugin I/O failed: {0}")]
    Io(#[source] io::Error),

    #[error("plugin did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("plugin execution cancelled")]
    Cancelled,

    /// The process exited cleanly but its stdout is not a valid response.
    #[error("malformed plugin response: {0}")]
    Protocol(#[from] prost::DecodeError),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Plugin Executor Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Runs a resolved plugin against one generation request.
///
/// `request` is a serialized `CodeGeneratorRequest` and the result is the
/// plugin's serialized `CodeGeneratorResponse`, both exactly as written.
#[async_trait]
pub trait PluginExecutor: Send + Sync {
    async fn execute(
        &self,
        record: &PluginRecord,
        request: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ExecutionError>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Container Executor
// ═══════════════════════════════════════════════════════════════════════════════

/// Executes plugins through a container CLI such as `docker`.
#[derive(Debug, Clone)]
pub struct ContainerExecutor {
    runtime: String,
    registry_domain: String,
    timeout: Duration,
}

impl ContainerExecutor {
    pub fn new(settings: &SandboxSettings) -> Self {
        Self {
            runtime: settings.runtime.clone(),
            registry_domain: settings.registry_domain.clone(),
            timeout: settings.timeout,
        }
    }

    /// The command that would be run for `record`.
    pub fn invocation(&self, record: &PluginRecord) -> ContainerInvocation {
        ContainerInvocation::build(
            &self.runtime,
            &self.registry_domain,
            &record.coordinate,
            &record.sandbox,
        )
    }
}

#[async_trait]
impl PluginExecutor for ContainerExecutor {
    async fn execute(
        &self,
        record: &PluginRecord,
        request: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ExecutionError> {
        let invocation = self
            .invocation(record)
            .named(format!("protogen-{}", Uuid::new_v4().simple()));
        debug!(
            plugin = %record.coordinate,
            command = %invocation,
            "Launching sandboxed plugin"
        );

        let started = Instant::now();
        let output = run(&invocation, request, self.timeout, cancel).await?;
        // Parsed only to reject garbage; the caller gets the bytes as written.
        let response = protocol::decode_response(&output)?;

        info!(
            plugin = %record.coordinate,
            image = invocation.image(),
            files = response.file.len(),
            bytes = output.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Plugin finished"
        );
        Ok(output)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Process Lifecycle
// ═══════════════════════════════════════════════════════════════════════════════

enum Outcome {
    Finished(io::Result<(ExitStatus, Vec<u8>, Vec<u8>)>),
    Cancelled,
    TimedOut,
}

/// Run `invocation`, writing `payload` to its stdin, and return its stdout.
///
/// A non-zero exit yields [`ExecutionError::Exited`] with the captured
/// stderr. Neither the child nor a named container outlives this call.
pub async fn run(
    invocation: &ContainerInvocation,
    payload: &[u8],
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, ExecutionError> {
    if cancel.is_cancelled() {
        return Err(ExecutionError::Cancelled);
    }

    let mut child = invocation
        .command()
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecutionError::Launch {
            program: invocation.program().to_string(),
            source,
        })?;
    let mut guard = RemoveOnDrop::new(invocation);

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Outcome::Cancelled,
        _ = tokio::time::sleep(timeout) => Outcome::TimedOut,
        result = communicate(&mut child, payload) => Outcome::Finished(result),
    };

    if !matches!(outcome, Outcome::Finished(Ok(_))) {
        terminate(&mut child, invocation).await;
    }
    guard.disarm();

    match outcome {
        Outcome::Finished(Ok((status, stdout, stderr))) => {
            let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
            if !status.success() {
                return Err(ExecutionError::Exited { status, stderr });
            }
            if !stderr.is_empty() {
                debug!(image = invocation.image(), stderr = %stderr, "Plugin wrote to stderr");
            }
            Ok(stdout)
        }
        Outcome::Finished(Err(err)) => Err(ExecutionError::Io(err)),
        Outcome::Cancelled => Err(ExecutionError::Cancelled),
        Outcome::TimedOut => Err(ExecutionError::TimedOut(timeout)),
    }
}

/// Feed stdin and drain stdout/stderr concurrently so neither pipe can
/// fill up and stall the child.
async fn communicate(
    child: &mut Child,
    payload: &[u8],
) -> io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (fed, stdout, stderr, status) = tokio::join!(
        feed(stdin, payload),
        read_all(stdout),
        read_all(stderr),
        child.wait(),
    );
    fed?;
    Ok((status?, stdout?, stderr?))
}

async fn feed(stdin: Option<ChildStdin>, payload: &[u8]) -> io::Result<()> {
    let Some(mut pipe) = stdin else {
        return Ok(());
    };
    match pipe.write_all(payload).await {
        // The plugin closed stdin early; its exit status decides the result.
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
    // `pipe` drops here, closing stdin so the plugin sees EOF.
}

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Upper bound on the `rm -f` call made during teardown.
const REMOVE_TIMEOUT: Duration = Duration::from_secs(10);

async fn terminate(child: &mut Child, invocation: &ContainerInvocation) {
    remove_container(invocation).await;

    // `kill` also waits, so the process is reaped before we return.
    if let Err(err) = child.kill().await {
        warn!(image = invocation.image(), error = %err, "Failed to kill plugin process");
    } else {
        debug!(image = invocation.image(), "Plugin process terminated");
    }
}

async fn remove_container(invocation: &ContainerInvocation) {
    let Some(name) = invocation.container_name() else {
        return;
    };
    let Some(mut command) = invocation.remove_command() else {
        return;
    };

    match tokio::time::timeout(REMOVE_TIMEOUT, command.status()).await {
        Ok(Ok(status)) if status.success() => {
            debug!(container = name, "Plugin container removed");
        }
        Ok(Ok(status)) => {
            warn!(container = name, %status, "Container removal exited with failure");
        }
        Ok(Err(err)) => {
            warn!(container = name, error = %err, "Failed to run container removal");
        }
        Err(_) => {
            warn!(container = name, timeout = ?REMOVE_TIMEOUT, "Container removal timed out");
        }
    }
}

/// Removes the named container from a background task if [`run`] is
/// dropped before it finishes. `kill_on_drop` only reaches the client.
struct RemoveOnDrop<'a> {
    invocation: &'a ContainerInvocation,
    armed: bool,
}

impl<'a> RemoveOnDrop<'a> {
    fn new(invocation: &'a ContainerInvocation) -> Self {
        Self {
            invocation,
            armed: invocation.container_name().is_some(),
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RemoveOnDrop<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let invocation = self.invocation.clone();
        handle.spawn(async move { remove_container(&invocation).await });
    }
}

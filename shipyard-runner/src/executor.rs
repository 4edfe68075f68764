//! Command execution boundary
//!
//! Every phase invocation goes through a [`CommandExecutor`]. The orchestrator
//! treats the process as opaque: it only sees an exit status and the
//! combined output bytes.
//!
//! Output is streamed into an [`OutputSink`] as it is produced, so whatever a
//! command printed before it was cancelled is still available afterwards.

use async_trait::async_trait;
use shipyard_core::ExecError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// A fully rendered command ready to run
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Program followed by its arguments
    pub argv: Vec<String>,
    pub workdir: PathBuf,
    pub env: HashMap<String, String>,
    /// When false the child starts from an empty environment plus `env`
    pub inherit_env: bool,
}

impl Invocation {
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }
}

/// Exit status of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub success: bool,
}

/// Shared buffer collecting a command's stdout and stderr in arrival order
#[derive(Debug, Clone, Default)]
pub struct OutputSink(Arc<Mutex<Vec<u8>>>);

impl OutputSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, bytes: &[u8]) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(bytes);
    }

    /// Copy of everything written so far
    pub fn snapshot(&self) -> Vec<u8> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs external commands
///
/// Implementations must be cancel-safe: dropping the returned future must
/// stop the underlying process, since timeouts are enforced that way. Output
/// goes to `sink` while the command runs, never only on completion.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(
        &self,
        invocation: &Invocation,
        sink: &OutputSink,
    ) -> Result<CommandOutput, ExecError>;
}

/// Executes commands as local child processes, without a shell
#[derive(Debug, Default, Clone)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(
        &self,
        invocation: &Invocation,
        sink: &OutputSink,
    ) -> Result<CommandOutput, ExecError> {
        let (program, args) = invocation
            .argv
            .split_first()
            .ok_or(ExecError::EmptyCommand)?;

        debug!("Executing: {} {:?}", program, args);

        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .current_dir(&invocation.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if !invocation.inherit_env {
            command.env_clear();
        }
        command.envs(&invocation.env);

        let mut child = command.spawn().map_err(|source| ExecError::Launch {
            program: program.clone(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Dropping this future drops `child`, which kills the process
        let (status, _, _) = tokio::try_join!(
            child.wait(),
            drain(stdout, sink),
            drain(stderr, sink)
        )
        .map_err(|source| ExecError::Io {
            program: program.clone(),
            source,
        })?;

        debug!(
            "Command {} finished: status={}, output_len={}",
            program,
            status,
            sink.len()
        );

        Ok(CommandOutput {
            exit_code: status.code(),
            success: status.success(),
        })
    }
}

/// Copies a pipe into the sink until EOF
async fn drain<R>(reader: Option<R>, sink: &OutputSink) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(());
    };

    let mut buffer = [0u8; 4096];
    loop {
        let count = reader.read(&mut buffer).await?;
        if count == 0 {
            return Ok(());
        }
        sink.append(&buffer[..count]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(argv: &[&str]) -> Invocation {
        Invocation {
            argv: argv.iter().map(|s| s.to_string()).collect(),
            workdir: std::env::temp_dir(),
            env: HashMap::new(),
            inherit_env: true,
        }
    }

    #[tokio::test]
    async fn test_process_success_captures_output() {
        let sink = OutputSink::new();
        let output = ProcessExecutor::new()
            .execute(
                &invocation(&["sh", "-c", "echo built; echo warned >&2"]),
                &sink,
            )
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.exit_code, Some(0));
        let captured = String::from_utf8(sink.snapshot()).unwrap();
        assert!(captured.contains("built\n"));
        assert!(captured.contains("warned\n"));
        assert_eq!(captured.len(), "built\nwarned\n".len());
    }

    #[tokio::test]
    async fn test_process_failure_exit_code() {
        let output = ProcessExecutor::new()
            .execute(&invocation(&["sh", "-c", "exit 3"]), &OutputSink::new())
            .await
            .unwrap();

        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_process_env_is_explicit() {
        let mut inv = invocation(&["sh", "-c", "printf %s \"$SHIPYARD_TARGET\""]);
        inv.env.insert("SHIPYARD_TARGET".to_string(), "el7".to_string());

        let sink = OutputSink::new();
        ProcessExecutor::new().execute(&inv, &sink).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&sink.snapshot()), "el7");
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let result = ProcessExecutor::new()
            .execute(
                &invocation(&["/nonexistent/shipyard-test-binary"]),
                &OutputSink::new(),
            )
            .await;

        assert!(matches!(result, Err(ExecError::Launch { .. })));
    }

    #[tokio::test]
    async fn test_empty_command() {
        let result = ProcessExecutor::new()
            .execute(&invocation(&[]), &OutputSink::new())
            .await;
        assert!(matches!(result, Err(ExecError::EmptyCommand)));
    }

    #[tokio::test]
    async fn test_cancelled_command_keeps_printed_output() {
        let sink = OutputSink::new();
        let inv = invocation(&["sh", "-c", "echo compiling-el7; sleep 30"]);

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            ProcessExecutor::new().execute(&inv, &sink),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(String::from_utf8_lossy(&sink.snapshot()), "compiling-el7\n");
    }
}

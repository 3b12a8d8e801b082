pub mod checksum;

use crate::error::ToolError;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use subprocess::{Exec, ExitStatus, PopenError, Redirection};

pub use checksum::ChecksumVerifier;

/// One invocation of an external program
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Capture stdout/stderr instead of inheriting the terminal
    pub capture: bool,
    /// Argument values that must never show up in logs
    pub secrets: Vec<String>,
}

impl CommandSpec {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            capture: true,
            secrets: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an argument that is masked in `Display` output
    #[must_use]
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        let arg = arg.into();
        self.secrets.push(arg.clone());
        self.args.push(arg);
        self
    }

    #[must_use]
    pub const fn capture(mut self, capture: bool) -> Self {
        self.capture = capture;
        self
    }
}

/// Command line with secrets masked, for logging
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            let mut shown = arg.clone();
            for secret in self.secrets.iter().filter(|s| !s.is_empty()) {
                shown = shown.replace(secret.as_str(), "***");
            }
            write!(f, " {shown}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("command", &self.to_string())
            .field("capture", &self.capture)
            .finish()
    }
}

/// Result of a finished external program
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// Runs external programs to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `spec` and wait for it to exit.
    ///
    /// A non-zero exit is reported through `CommandOutput`, not as an error.
    ///
    /// # Errors
    /// - `ToolError::NotFound` if the program is not installed
    /// - `ToolError::Spawn` if the process could not be started or waited on
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ToolError>;
}

/// Runner backed by the `subprocess` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct SubprocessRunner;

impl SubprocessRunner {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn run_blocking(spec: &CommandSpec) -> Result<CommandOutput, ToolError> {
        let exec = Exec::cmd(&spec.program).args(spec.args.as_slice());

        if spec.capture {
            let data = exec
                .stdout(Redirection::Pipe)
                .stderr(Redirection::Pipe)
                .capture()
                .map_err(|e| popen_error(&spec.program, e))?;

            Ok(CommandOutput {
                exit_code: exit_code(data.exit_status),
                stdout: String::from_utf8_lossy(&data.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&data.stderr).into_owned(),
            })
        } else {
            let status = exec.join().map_err(|e| popen_error(&spec.program, e))?;
            Ok(CommandOutput {
                exit_code: exit_code(status),
                ..CommandOutput::default()
            })
        }
    }
}

#[async_trait]
impl CommandRunner for SubprocessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ToolError> {
        resolve_program(&spec.program)?;

        let owned = spec.clone();
        tokio::task::spawn_blocking(move || Self::run_blocking(&owned))
            .await
            .map_err(|e| ToolError::Spawn {
                program: spec.program.clone(),
                message: format!("worker task failed: {e}"),
            })?
    }
}

/// Human-readable size of `path` as reported by `du -sh`
pub async fn disk_usage(runner: &dyn CommandRunner, path: &std::path::Path) -> Option<String> {
    let spec = CommandSpec::new("du").arg("-sh").arg(path.to_string_lossy());
    match runner.run(&spec).await {
        Ok(output) if output.success() => {
            output.stdout.split_whitespace().next().map(ToString::to_string)
        }
        Ok(output) => {
            tracing::debug!("du exited with {:?} for {}", output.exit_code, path.display());
            None
        }
        Err(e) => {
            tracing::debug!("Failed to calculate size of {}: {e}", path.display());
            None
        }
    }
}

/// Locate `program` on `PATH` (or verify an explicit path)
pub fn resolve_program(program: &str) -> Result<PathBuf, ToolError> {
    which::which(program).map_err(|_| ToolError::NotFound {
        program: program.to_string(),
    })
}

fn exit_code(status: ExitStatus) -> Option<i32> {
    match status {
        ExitStatus::Exited(code) => i32::try_from(code).ok(),
        ExitStatus::Other(code) => Some(code),
        ExitStatus::Signaled(_) | ExitStatus::Undetermined => None,
    }
}

fn popen_error(program: &str, error: PopenError) -> ToolError {
    match error {
        PopenError::IoError(e) if e.kind() == std::io::ErrorKind::NotFound => {
            ToolError::NotFound {
                program: program.to_string(),
            }
        }
        other => ToolError::Spawn {
            program: program.to_string(),
            message: other.to_string(),
        },
    }
}

use crate::error::{ChecksumError, ToolError};
use crate::tools::{CommandRunner, CommandSpec};
use std::path::Path;
use std::sync::Arc;

/// SHA-256 verification through an external digest tool (`sha256sum`).
///
/// Fails closed: anything short of an exact (case-insensitive) digest match is
/// reported as not verified.
pub struct ChecksumVerifier {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl std::fmt::Debug for ChecksumVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumVerifier")
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}

impl ChecksumVerifier {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    /// Check `path` against `expected`, returning the reason on failure.
    ///
    /// # Errors
    /// One `ChecksumError` variant per failure path. Missing file and missing
    /// hash are detected before the digest tool runs.
    pub async fn check(&self, path: &Path, expected: Option<&str>) -> Result<(), ChecksumError> {
        if !path.exists() {
            return Err(ChecksumError::MissingFile(path.to_path_buf()));
        }

        let expected = match expected.map(str::trim) {
            Some(hash) if !hash.is_empty() => hash.to_ascii_lowercase(),
            _ => return Err(ChecksumError::MissingHash(path.to_path_buf())),
        };

        let spec = CommandSpec::new(self.program.as_str()).arg(path.to_string_lossy());
        let output = self.runner.run(&spec).await.map_err(|e| match e {
            ToolError::NotFound { program } => ChecksumError::ToolUnavailable(program),
            ToolError::Spawn { program, message } => ChecksumError::ToolFailed {
                program,
                code: None,
                stderr: message,
            },
        })?;

        if !output.success() {
            return Err(ChecksumError::ToolFailed {
                program: self.program.clone(),
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        let actual = output
            .stdout
            .split_whitespace()
            .next()
            .ok_or_else(|| ChecksumError::UnparseableOutput {
                program: self.program.clone(),
                path: path.to_path_buf(),
            })?
            .to_ascii_lowercase();

        if actual == expected {
            Ok(())
        } else {
            Err(ChecksumError::Mismatch { expected, actual })
        }
    }

    /// Boolean form of [`Self::check`] that logs why verification failed
    pub async fn verify(&self, path: &Path, expected: Option<&str>) -> bool {
        match self.check(path, expected).await {
            Ok(()) => {
                tracing::debug!("Checksum verification passed for {}", display_name(path));
                true
            }
            Err(e) => {
                self.report(path, &e);
                false
            }
        }
    }

    /// Log a failed check, one distinct message per reason
    pub fn report(&self, path: &Path, error: &ChecksumError) {
        let name = display_name(path);
        match error {
            ChecksumError::Mismatch { expected, actual } => {
                tracing::error!("CHECKSUM MISMATCH for {name}:");
                tracing::error!("   Expected: {expected}");
                tracing::error!("   Actual:   {actual}");
            }
            ChecksumError::ToolFailed { .. } => {
                tracing::error!("CHECKSUM ERROR: {} command failed for {name}", self.program);
                tracing::error!("   {error}");
            }
            _ => tracing::error!("CHECKSUM ERROR: {error}"),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |n| n.to_string_lossy().into_owned(),
    )
}

//! Hugging Face repository sync through `huggingface-cli download`.
//!
//! Each repository lands in `<staging>/huggingface/<repo_id>` as real files
//! (no cache symlinks). The sync client resumes partial downloads and verifies
//! what it fetches, so there is no checksum step here.

use crate::error::{SyncError, ToolError};
use crate::models::manager::{split_ids, BatchTally};
use crate::models::staging::StagingLayout;
use crate::tools::{disk_usage, CommandRunner, CommandSpec};
use std::path::Path;
use std::sync::Arc;

/// Sequential repository downloader
pub struct RepoSync {
    runner: Arc<dyn CommandRunner>,
    program: String,
    layout: StagingLayout,
    debug: bool,
}

impl std::fmt::Debug for RepoSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoSync")
            .field("program", &self.program)
            .field("layout", &self.layout)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

impl RepoSync {
    #[must_use]
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        program: impl Into<String>,
        layout: StagingLayout,
        debug: bool,
    ) -> Self {
        Self {
            runner,
            program: program.into(),
            layout,
            debug,
        }
    }

    /// Sync client invocation for one repository
    #[must_use]
    pub fn command(&self, repo_id: &str, token: Option<&str>) -> CommandSpec {
        let local_dir = self.layout.repo_dir(repo_id);
        let mut spec = CommandSpec::new(self.program.as_str())
            .arg("download")
            .arg(repo_id)
            .arg("--local-dir")
            .arg(local_dir.to_string_lossy())
            .arg("--local-dir-use-symlinks")
            .arg("False")
            .arg("--resume-download")
            // Debug mode streams the client's own progress output
            .capture(!self.debug);

        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
            spec = spec.arg("--token").secret_arg(token);
        }
        spec
    }

    /// Download every repository in `list`, continuing past failures
    pub async fn download_repos(&self, list: &str, token: Option<&str>) -> BatchTally {
        let repos = split_ids(list);
        let mut tally = BatchTally::default();

        if repos.is_empty() {
            tracing::info!("No Hugging Face repos specified to download.");
            return tally;
        }

        tracing::info!("Found Hugging Face repos to download...");

        if token.is_some_and(|t| !t.trim().is_empty()) {
            tracing::debug!("Using provided HuggingFace token");
        } else {
            tracing::debug!("No HuggingFace token provided");
        }

        for repo_id in &repos {
            let result = self.sync_repo(repo_id, token).await;
            tally.record(result.is_ok());
        }

        tracing::info!(
            "Hugging Face repos complete: {} successful, {} failed",
            tally.succeeded,
            tally.failed
        );
        tally
    }

    /// Sync one repository into its local directory.
    ///
    /// # Errors
    /// - `SyncError::Tool` if the sync client is missing or could not start
    /// - `SyncError::Failed` if it exited non-zero
    pub async fn sync_repo(&self, repo_id: &str, token: Option<&str>) -> Result<(), SyncError> {
        tracing::info!("Starting HF download: {repo_id}");

        let spec = self.command(repo_id, token);
        tracing::debug!("Running: {spec}");

        let output = match self.runner.run(&spec).await {
            Ok(output) => output,
            Err(e @ ToolError::NotFound { .. }) => {
                tracing::error!("ERROR: Cannot download '{repo_id}': {e}");
                return Err(e.into());
            }
            Err(e) => {
                tracing::error!("ERROR: Failed to download '{repo_id}': {e}");
                tracing::info!("   Continuing with remaining downloads...");
                return Err(e.into());
            }
        };

        if !output.success() {
            tracing::error!("ERROR: Failed to download '{repo_id}'.");
            tracing::debug!(
                "   {} exited with code {:?}: {}",
                self.program,
                output.exit_code,
                output.stderr.trim()
            );
            if token.is_some_and(|t| !t.trim().is_empty()) {
                tracing::warn!(
                    "   HINT: Please check if your token is valid and has access to this repository."
                );
            } else {
                tracing::warn!("   HINT: This is likely a private/gated repository. Please provide a");
                tracing::warn!("   HUGGINGFACE_TOKEN (huggingface.co access token).");
            }
            tracing::info!("   Continuing with remaining downloads...");
            return Err(SyncError::Failed {
                program: self.program.clone(),
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        tracing::info!("Completed HF download: {repo_id}");
        if self.debug {
            self.report_size(&self.layout.repo_dir(repo_id)).await;
        }
        Ok(())
    }

    async fn report_size(&self, dir: &Path) {
        if let Some(size) = disk_usage(self.runner.as_ref(), dir).await {
            tracing::debug!("Downloaded size: {size}");
        }
    }
}

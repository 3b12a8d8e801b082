use crate::civitai::MetadataResolver;
use crate::config::schema::Config;
use crate::error::{NexisError, Result};
use crate::http::RetryingClient;
use crate::huggingface::RepoSync;
use crate::models::download::{format_bytes, FileFetcher};
use crate::models::manager::{process_civitai_downloads, BatchTally};
use crate::models::registry::{Category, CATEGORIES};
use crate::models::staging::StagingLayout;
use crate::tools::{disk_usage, ChecksumVerifier, CommandRunner, SubprocessRunner};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// How many staged files the debug summary lists
const SUMMARY_FILE_LIMIT: usize = 10;

/// Tallies for one complete run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub repos: BatchTally,
    pub models: Vec<(Category, BatchTally)>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.repos.succeeded + self.models.iter().map(|(_, t)| t.succeeded).sum::<usize>()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.repos.failed + self.models.iter().map(|(_, t)| t.failed).sum::<usize>()
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    #[must_use]
    pub fn tally(&self, category: Category) -> Option<BatchTally> {
        if category == Category::HuggingFace {
            return Some(self.repos);
        }
        self.models
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, t)| *t)
    }
}

/// Runs the whole download sequence: directory skeleton, Hugging Face repos,
/// then Civitai checkpoints, loras and vaes.
pub struct Orchestrator {
    config: Config,
    runner: Arc<dyn CommandRunner>,
    fetcher: FileFetcher,
    repo_sync: RepoSync,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("fetcher", &self.fetcher)
            .field("repo_sync", &self.repo_sync)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Orchestrator that launches real processes
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_runner(config, Arc::new(SubprocessRunner::new()))
    }

    #[must_use]
    pub fn with_runner(config: Config, runner: Arc<dyn CommandRunner>) -> Self {
        let layout = StagingLayout::new(config.staging.root.clone());

        let resolver = MetadataResolver::new(
            RetryingClient::new(config.retry_policy()),
            config.civitai.api_base.as_str(),
            config.civitai.download_base.as_str(),
            config.request_timeout(),
        );
        let verifier = ChecksumVerifier::new(runner.clone(), config.checksum.program.as_str());
        let fetcher = FileFetcher::new(
            resolver,
            runner.clone(),
            verifier,
            layout.clone(),
            config.downloader.clone(),
            config.debug,
        );
        let repo_sync = RepoSync::new(
            runner.clone(),
            config.huggingface.program.as_str(),
            layout,
            config.debug,
        );

        Self {
            config,
            runner,
            fetcher,
            repo_sync,
        }
    }

    #[must_use]
    pub const fn layout(&self) -> &StagingLayout {
        self.fetcher.layout()
    }

    /// Run every configured batch in order.
    ///
    /// # Errors
    /// Only when the staging directories cannot be created. Individual
    /// download failures are counted in the report instead.
    pub async fn run(&self) -> Result<RunReport> {
        let started_at = Utc::now();
        tracing::info!("Initializing Nexis download manager...");
        self.log_configuration();

        self.layout().create_directory_structure().map_err(|e| {
            NexisError::Config(format!(
                "Cannot create staging directories under {}: {e}",
                self.layout().root().display()
            ))
        })?;

        let repos = self
            .repo_sync
            .download_repos(
                &self.config.huggingface.repos,
                self.config.huggingface.token.as_deref(),
            )
            .await;

        let token = self.config.civitai.token.as_deref();
        let mut models = Vec::with_capacity(Category::CIVITAI.len());
        for category in Category::CIVITAI {
            let list = self.model_list(category);
            let tally = process_civitai_downloads(&self.fetcher, list, category, token).await;
            models.push((category, tally));
        }

        tracing::info!("All downloads complete.");

        if self.config.debug {
            self.log_summary().await;
        }

        Ok(RunReport {
            repos,
            models,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn model_list(&self, category: Category) -> &str {
        match category {
            Category::Checkpoints => &self.config.civitai.checkpoints,
            Category::Loras => &self.config.civitai.loras,
            Category::Vae => &self.config.civitai.vaes,
            Category::HuggingFace => &self.config.huggingface.repos,
        }
    }

    fn log_configuration(&self) {
        if !self.config.debug {
            return;
        }
        tracing::debug!("Debug mode enabled - showing detailed progress");
        tracing::debug!("Staging root: {}", self.layout().root().display());

        for info in CATEGORIES {
            let value = self.model_list(info.category);
            let shown = if value.trim().is_empty() { "<empty>" } else { value };
            tracing::debug!("{}: {shown}", info.env_var);
        }
    }

    async fn log_summary(&self) {
        tracing::debug!("=== DOWNLOAD SUMMARY ===");

        match self.layout().scan_files() {
            Ok(files) if files.is_empty() => tracing::debug!("No files downloaded"),
            Ok(files) => {
                tracing::debug!("Downloaded files:");
                for file in files.iter().take(SUMMARY_FILE_LIMIT) {
                    let category = file.category.map_or("other", Category::dir_name);
                    tracing::debug!(
                        "  [{category}] {} ({})",
                        file.path.display(),
                        format_bytes(file.size_bytes)
                    );
                }
                if files.len() > SUMMARY_FILE_LIMIT {
                    tracing::debug!("  ... and {} more files", files.len() - SUMMARY_FILE_LIMIT);
                }

                let total = match disk_usage(self.runner.as_ref(), self.layout().root()).await {
                    Some(size) => size,
                    None => format_bytes(files.iter().map(|f| f.size_bytes).sum()),
                };
                tracing::debug!("Total download size: {total}");
            }
            Err(e) => tracing::debug!("Error generating summary: {e}"),
        }

        tracing::debug!("=== END SUMMARY ===");
    }
}

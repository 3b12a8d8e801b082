use crate::civitai::{Aria2Classifier, FailureClassifier, MetadataResolver, ModelDescriptor};
use crate::config::schema::DownloaderConfig;
use crate::error::FetchError;
use crate::models::registry::Category;
use crate::models::staging::{is_present, StagingLayout};
use crate::tools::{ChecksumVerifier, CommandRunner, CommandSpec};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What a successful fetch did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Blank model id, nothing to do
    Empty,
    /// A non-empty file was already staged
    Skipped(PathBuf),
    Downloaded(PathBuf),
}

/// Civitai model downloader driving an external multi-connection downloader
pub struct FileFetcher {
    resolver: MetadataResolver,
    runner: Arc<dyn CommandRunner>,
    verifier: ChecksumVerifier,
    classifier: Box<dyn FailureClassifier>,
    layout: StagingLayout,
    downloader: DownloaderConfig,
    debug: bool,
}

impl std::fmt::Debug for FileFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileFetcher")
            .field("resolver", &self.resolver)
            .field("verifier", &self.verifier)
            .field("layout", &self.layout)
            .field("downloader", &self.downloader)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

impl FileFetcher {
    /// Create new fetcher. Failures are classified from aria2c exit codes.
    #[must_use]
    pub fn new(
        resolver: MetadataResolver,
        runner: Arc<dyn CommandRunner>,
        verifier: ChecksumVerifier,
        layout: StagingLayout,
        downloader: DownloaderConfig,
        debug: bool,
    ) -> Self {
        Self {
            resolver,
            runner,
            verifier,
            classifier: Box::new(Aria2Classifier::new()),
            layout,
            downloader,
            debug,
        }
    }

    #[must_use]
    pub const fn layout(&self) -> &StagingLayout {
        &self.layout
    }

    /// Download one Civitai model into its category directory.
    ///
    /// # Errors
    /// - `FetchError::MetadataUnavailable` if the model could not be resolved
    /// - `FetchError::DownloadFailed` if the downloader exited non-zero
    /// - `FetchError::ChecksumFailed` if the staged file did not verify (it is removed)
    /// - `FetchError::Tool` if the downloader is not installed
    pub async fn fetch(
        &self,
        model_id: &str,
        category: Category,
        token: Option<&str>,
    ) -> Result<FetchOutcome, FetchError> {
        let model_id = model_id.trim();
        if model_id.is_empty() {
            return Ok(FetchOutcome::Empty);
        }

        tracing::debug!("Processing Civitai model ID: {model_id}");

        let Some(descriptor) = self.resolver.resolve(model_id, token).await else {
            tracing::error!("ERROR: Could not retrieve metadata for Civitai model ID {model_id}.");
            return Err(FetchError::MetadataUnavailable {
                model_id: model_id.to_string(),
            });
        };

        let filename = descriptor.filename.as_str();
        tracing::debug!("Filename: {filename}");
        tracing::debug!("Download URL: {}", descriptor.download_url);

        let model_dir = self.layout.category_dir(category);
        fs::create_dir_all(&model_dir)?;

        let output_file = self.layout.destination(category, filename);
        if is_present(&output_file) {
            tracing::info!(
                "Skipping download for '{filename}', file already exists in downloads."
            );
            return Ok(FetchOutcome::Skipped(output_file));
        }

        tracing::info!("Starting Civitai download: {filename} ({category})");

        let url = descriptor.authorized_url(token)?;
        let encoded_token = url
            .rsplit_once("token=")
            .map(|(_, rest)| rest.split('&').next().unwrap_or(rest).to_string());
        let mut spec = self.downloader_command(&model_dir, filename, url);
        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
            spec.secrets.push(token.to_string());
            spec.secrets.extend(encoded_token);
        }
        tracing::debug!("Running: {spec}");

        let output = match self.runner.run(&spec).await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!("DOWNLOAD ERROR: {e}");
                remove_partial(&output_file);
                return Err(e.into());
            }
        };

        if !output.success() {
            tracing::error!("DOWNLOAD ERROR: Failed to download {filename} from Civitai.");
            tracing::error!(
                "   {} command failed with exit code {:?}",
                self.downloader.program,
                output.exit_code
            );
            let details = output.stderr.trim();
            if !details.is_empty() {
                tracing::error!("   Error details: {details}");
            }

            remove_partial(&output_file);

            let kind = self.classifier.classify(&output);
            if let Some(hint) = kind.hint(model_id) {
                tracing::warn!("   HINT: {hint}");
            }

            return Err(FetchError::DownloadFailed {
                filename: filename.to_string(),
                kind,
                exit_code: output.exit_code,
            });
        }

        let size = fs::metadata(&output_file).map_or(0, |m| m.len());
        tracing::info!("Download completed for {filename} ({})", format_bytes(size));

        self.verify(&descriptor, &output_file).await?;

        tracing::info!("Successfully completed Civitai download: {filename}");
        Ok(FetchOutcome::Downloaded(output_file))
    }

    async fn verify(&self, descriptor: &ModelDescriptor, output_file: &Path) -> Result<(), FetchError> {
        let Some(expected) = descriptor.expected_hash.as_deref() else {
            tracing::debug!(
                "No checksum available for {}, skipping validation",
                descriptor.filename
            );
            return Ok(());
        };

        tracing::debug!("Verifying checksum for {}...", descriptor.filename);
        match self.verifier.check(output_file, Some(expected)).await {
            Ok(()) => {
                tracing::info!("Checksum verification PASSED for {}.", descriptor.filename);
                Ok(())
            }
            Err(source) => {
                self.verifier.report(output_file, &source);
                tracing::error!(
                    "DOWNLOAD ERROR: Checksum verification FAILED for {}.",
                    descriptor.filename
                );
                tracing::error!("   Removing corrupted file and marking download as failed.");
                remove_partial(output_file);
                Err(FetchError::ChecksumFailed {
                    filename: descriptor.filename.clone(),
                    source,
                })
            }
        }
    }

    /// aria2c invocation for one file
    fn downloader_command(&self, dir: &Path, filename: &str, url: String) -> CommandSpec {
        let (log_level, summary_interval) = if self.debug {
            ("info", 10)
        } else {
            ("warn", 0)
        };

        CommandSpec::new(self.downloader.program.as_str())
            .arg("-x")
            .arg(self.downloader.connections.to_string())
            .arg("-s")
            .arg(self.downloader.segments.to_string())
            .arg("--continue=true")
            .arg(format!("--console-log-level={log_level}"))
            .arg(format!("--summary-interval={summary_interval}"))
            .arg(format!("--dir={}", dir.display()))
            .arg(format!("--out={filename}"))
            .arg(url)
    }
}

fn remove_partial(path: &Path) {
    if path.exists() {
        tracing::warn!("   Removing partial download file: {}", path.display());
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("   Could not remove {}: {e}", path.display());
        }
    }
}

/// Format bytes as human-readable string
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

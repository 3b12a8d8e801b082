use crate::models::download::{FetchOutcome, FileFetcher};
use crate::models::registry::Category;

/// Success/failure counters for one batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchTally {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchTally {
    pub fn record(&mut self, ok: bool) {
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Split a comma-separated id list into trimmed, non-empty ids, in order
#[must_use]
pub fn split_ids(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Download every model id in `list` into `category`, one at a time.
///
/// Individual failures are logged and counted; they never stop the batch.
pub async fn process_civitai_downloads(
    fetcher: &FileFetcher,
    list: &str,
    category: Category,
    token: Option<&str>,
) -> BatchTally {
    let label = category.label();
    let ids = split_ids(list);
    let mut tally = BatchTally::default();

    if ids.is_empty() {
        tracing::info!("No {label} specified to download.");
        return tally;
    }

    tracing::info!("Found {label} to download...");
    tracing::debug!("Processing list: {list}");

    for model_id in &ids {
        match fetcher.fetch(model_id, category, token).await {
            Ok(outcome) => {
                if let FetchOutcome::Downloaded(path) | FetchOutcome::Skipped(path) = &outcome {
                    tracing::debug!("{model_id} staged at {}", path.display());
                }
                tally.record(true);
            }
            Err(e) => {
                tracing::debug!("{model_id} failed: {e}");
                tally.record(false);
                tracing::info!("Continuing with remaining {label}...");
            }
        }
    }

    tracing::info!(
        "{label} complete: {} successful, {} failed",
        tally.succeeded,
        tally.failed
    );
    tally
}

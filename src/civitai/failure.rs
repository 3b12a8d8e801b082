use crate::tools::CommandOutput;
use std::fmt;

/// Closed set of download failure categories, each with its own hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Authentication or authorization problem
    Forbidden,
    /// The model id does not exist (anymore)
    NotFound,
    /// Transient network trouble, may succeed on retry
    Network,
    Unknown,
}

impl FailureKind {
    /// Remediation hint for the log, if there is one
    #[must_use]
    pub fn hint(self, model_id: &str) -> Option<String> {
        match self {
            Self::Forbidden => Some(
                "This may be a private model requiring authentication. \
                 Please ensure you have a valid CIVITAI_TOKEN if this is a private model."
                    .to_string(),
            ),
            Self::NotFound => Some(format!(
                "Model ID {model_id} may not exist or may have been removed."
            )),
            Self::Network => Some(
                "Network connectivity issue. The download may succeed on retry.".to_string(),
            ),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::Network => "network",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Maps a failed downloader run to a [`FailureKind`]
pub trait FailureClassifier: Send + Sync {
    fn classify(&self, output: &CommandOutput) -> FailureKind;
}

/// Scans stderr for well-known HTTP phrases
#[derive(Debug, Default, Clone, Copy)]
pub struct SubstringClassifier;

impl FailureClassifier for SubstringClassifier {
    fn classify(&self, output: &CommandOutput) -> FailureKind {
        let text = output.stderr.as_str();
        let lower = text.to_lowercase();

        if text.contains("403") || text.contains("Forbidden") {
            FailureKind::Forbidden
        } else if text.contains("404") || text.contains("Not Found") {
            FailureKind::NotFound
        } else if lower.contains("timeout") || lower.contains("connection") {
            FailureKind::Network
        } else {
            FailureKind::Unknown
        }
    }
}

/// Uses aria2c's documented exit codes, falling back to the stderr scan for
/// codes that carry no category.
#[derive(Debug, Default, Clone, Copy)]
pub struct Aria2Classifier {
    fallback: SubstringClassifier,
}

impl Aria2Classifier {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fallback: SubstringClassifier,
        }
    }

    const fn from_exit_code(code: i32) -> Option<FailureKind> {
        match code {
            24 => Some(FailureKind::Forbidden),
            3 => Some(FailureKind::NotFound),
            2 | 6 | 19 => Some(FailureKind::Network),
            _ => None,
        }
    }
}

impl FailureClassifier for Aria2Classifier {
    fn classify(&self, output: &CommandOutput) -> FailureKind {
        output
            .exit_code
            .and_then(Self::from_exit_code)
            .unwrap_or_else(|| self.fallback.classify(output))
    }
}

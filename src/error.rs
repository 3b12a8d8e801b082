use crate::civitai::failure::FailureKind;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the downloader
#[derive(Error, Debug)]
pub enum NexisError {
    #[error("Config error: {0}\n\nTroubleshooting:\n- Check the file passed with --config or ~/.config/nexis/config.toml\n- Check the *_TO_DOWNLOAD and *_TOKEN environment variables\n- Run with DEBUG_MODE=true or RUST_LOG=debug for more details")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("External tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Metadata request errors
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Network error: {0}\n\nTroubleshooting:\n- Check internet connection\n- Verify firewall settings\n- Check the Civitai service status")]
    Request(#[from] reqwest::Error),

    #[error("Server kept answering {status} after {attempts} attempts")]
    RetriesExhausted { status: u16, attempts: u32 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Errors raised while launching an external program
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{program} not found in PATH\n\nTroubleshooting:\n- Install it with your package manager (aria2, coreutils, huggingface_hub[cli])\n- Or point the matching `program` key in the config file at the binary")]
    NotFound { program: String },

    #[error("Failed to run {program}: {message}")]
    Spawn { program: String, message: String },
}

/// Failure of a single repository sync
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("{program} exited with code {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Reasons a checksum could not be confirmed
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChecksumError {
    #[error("File does not exist: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("No expected hash provided for {}", .0.display())]
    MissingHash(PathBuf),

    #[error("{0} command not found. Please ensure coreutils is installed.")]
    ToolUnavailable(String),

    #[error("{program} exited with code {code:?}: {stderr}")]
    ToolFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Invalid {program} output format for {}", .path.display())]
    UnparseableOutput { program: String, path: PathBuf },

    #[error("Checksum mismatch: expected {expected}, actual {actual}")]
    Mismatch { expected: String, actual: String },
}

/// Failure of a single model fetch
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Could not retrieve metadata for Civitai model ID {model_id}")]
    MetadataUnavailable { model_id: String },

    #[error("Failed to download {filename} ({kind}, exit code {exit_code:?})")]
    DownloadFailed {
        filename: String,
        kind: FailureKind,
        exit_code: Option<i32>,
    },

    #[error("Checksum verification failed for {filename}: {source}")]
    ChecksumFailed {
        filename: String,
        #[source]
        source: ChecksumError,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NexisError>;

pub mod download;
pub mod manager;
pub mod registry;
pub mod staging;

pub use download::{FetchOutcome, FileFetcher};
pub use manager::{process_civitai_downloads, split_ids, BatchTally};
pub use registry::{Category, CategoryInfo};
pub use staging::{StagedFile, StagingLayout};

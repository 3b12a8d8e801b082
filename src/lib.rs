pub mod civitai;
pub mod config;
pub mod error;
pub mod http;
pub mod huggingface;
pub mod models;
pub mod orchestrator;
pub mod tools;

pub use error::{NexisError, Result};
pub use orchestrator::{Orchestrator, RunReport};

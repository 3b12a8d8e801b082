//! Configuration module for nexis-downloader
//!
//! Loads config from the file passed with `--config`, or from
//! `$XDG_CONFIG_HOME/nexis/config.toml` when it exists, falling back to
//! embedded defaults. The download lists, tokens and `DEBUG_MODE` are then
//! read from the environment, which wins over the file.
//!
//! # Example
//!
//! ```no_run
//! use nexis_downloader::config::Config;
//!
//! let config = Config::load(None).expect("Failed to load config");
//! println!("Staging root: {}", config.staging.root.display());
//! println!("Checkpoints: {}", config.civitai.checkpoints);
//! ```

pub mod schema;

pub use schema::Config;

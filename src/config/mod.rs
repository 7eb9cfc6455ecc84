//! Configuration module for Newt
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use newt::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("newt.toml")).unwrap();
//! println!("Crawler will run {} workers", config.crawler.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CommitMode, Config, CrawlerConfig, FrontierConfig, HttpConfig, IndexConfig, ReseedConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;

//! Configuration module for Toc-Ripple
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section is optional; an empty file yields the built-in defaults.
//!
//! # Example
//!
//! ```no_run
//! use toc_ripple::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("toc-ripple.toml")).unwrap();
//! println!("Default host spacing: {}ms", config.queue.default_interval);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, FeedEntry, HookEntry, HttpConfig, NormalizeConfig, QueueConfig};

// Re-export parser functions
pub use parser::{config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;

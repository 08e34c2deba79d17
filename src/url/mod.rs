//! URL handling module for Toc-Ripple
//!
//! This module provides validation of caller-supplied URLs and extraction of the
//! host key that partitions request throttling.

mod domain;
mod validate;

// Re-export main functions
pub use domain::{extract_host_key, host_key};
pub use validate::validate_url;

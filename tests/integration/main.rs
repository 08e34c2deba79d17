//! Integration tests for the fetch pipeline and table-of-contents resolution
//!
//! These tests use wiremock to stand in for the sites being scraped and run
//! every request through real host queues.

mod common;
mod fetch_tests;
mod resolve_tests;

//! Fetch module: HTTP clients, HTML tree construction, and the queued pipeline
//!
//! This module contains:
//! - The `HttpClient` capability and its streaming and challenge implementations
//! - Document/fragment tree builders fed from buffered or streamed bodies
//! - `FetchPipeline`, which routes every request through a host queue

mod client;
mod parser;
mod pipeline;

pub use client::{
    build_challenge_client, build_http_client, is_challenge_server, server_header,
    ChallengeClient, HttpClient, HttpRequest, Method, RequestOptions, StreamingClient,
};
pub use parser::{parse_buffered, ParserKind, NOT_LOADED, NO_DOCUMENT};
pub use pipeline::{FetchPipeline, FullResponse, LinkStatus};

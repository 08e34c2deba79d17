//! Per-host request queues
//!
//! Every outbound request is serialized and throttled per destination host:
//! - `HostQueue`: a FIFO that runs one task at a time with randomized spacing
//! - `QueueRegistry`: lazily maps host keys to queues, split into a default and
//!   a fast partition so cheap checks never wait behind full page fetches

mod host_queue;
mod registry;

pub use host_queue::{HostQueue, MIN_CEILING};
pub use registry::{Partition, QueueRegistry};

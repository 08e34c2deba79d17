use crate::config::QueueConfig;
use crate::queue::HostQueue;
use crate::url::extract_host_key;
use crate::FetchError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Which set of host queues a request is throttled by
///
/// Callers pick the partition per operation type; there is no automatic
/// promotion between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Partition {
    /// Ordinary page and feed fetches
    #[default]
    Default,
    /// Cheap, latency-sensitive requests such as link availability checks
    Fast,
}

/// Maps host keys to their queues
///
/// The registry holds two independent maps, one per [`Partition`], each with its
/// own spacing ceiling. A host always maps to the same queue instance within a
/// partition for as long as the registry lives; queues are never evicted.
///
/// Construct one registry at startup and share it (`Arc<QueueRegistry>`) with
/// every component that issues requests.
#[derive(Debug)]
pub struct QueueRegistry {
    default_ceiling: Duration,
    fast_ceiling: Duration,
    default_queues: Mutex<HashMap<String, Arc<HostQueue>>>,
    fast_queues: Mutex<HashMap<String, Arc<HostQueue>>>,
}

impl QueueRegistry {
    /// Creates an empty registry with the given per-partition ceilings
    pub fn new(default_ceiling: Duration, fast_ceiling: Duration) -> Self {
        Self {
            default_ceiling,
            fast_ceiling,
            default_queues: Mutex::new(HashMap::new()),
            fast_queues: Mutex::new(HashMap::new()),
        }
    }

    /// Creates an empty registry from the `[queue]` configuration section
    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(
            Duration::from_millis(config.default_interval),
            Duration::from_millis(config.fast_interval),
        )
    }

    /// Returns the queue responsible for `url` in `partition`
    ///
    /// The queue is created on first reference to its host.
    ///
    /// # Returns
    ///
    /// * `Ok(Arc<HostQueue>)` - The host's queue
    /// * `Err(FetchError::InvalidHost)` - No host could be extracted from `url`
    pub fn resolve(&self, url: &str, partition: Partition) -> Result<Arc<HostQueue>, FetchError> {
        let key = extract_host_key(url)?;
        let ceiling = self.ceiling(partition);

        let mut queues = self.queues(partition);
        let queue = queues.entry(key).or_insert_with_key(|key| {
            tracing::debug!(host = %key, ?partition, ?ceiling, "Creating host queue");
            HostQueue::new(key.clone(), ceiling)
        });
        Ok(Arc::clone(queue))
    }

    /// The configured spacing ceiling for a partition
    pub fn ceiling(&self, partition: Partition) -> Duration {
        match partition {
            Partition::Default => self.default_ceiling,
            Partition::Fast => self.fast_ceiling,
        }
    }

    /// Number of hosts with a queue in `partition`
    pub fn len(&self, partition: Partition) -> usize {
        self.queues(partition).len()
    }

    /// Whether no queue has been created in `partition` yet
    pub fn is_empty(&self, partition: Partition) -> bool {
        self.queues(partition).is_empty()
    }

    /// Host keys with a queue in `partition`, sorted
    pub fn hosts(&self, partition: Partition) -> Vec<String> {
        let mut hosts: Vec<String> = self.queues(partition).keys().cloned().collect();
        hosts.sort();
        hosts
    }

    fn queues(&self, partition: Partition) -> MutexGuard<'_, HashMap<String, Arc<HostQueue>>> {
        let map = match partition {
            Partition::Default => &self.default_queues,
            Partition::Fast => &self.fast_queues,
        };
        map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for QueueRegistry {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

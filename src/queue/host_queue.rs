use crate::QueueError;
use futures::FutureExt;
use rand::Rng;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

/// Smallest ceiling a queue accepts; lower values are raised to this
pub const MIN_CEILING: Duration = Duration::from_millis(10);

/// A deferred unit of work; its output travels back through a oneshot channel
type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Mutable part of a queue, only touched inside short critical sections
struct QueueState {
    /// Tasks submitted but not yet started, in submission order
    pending: VecDeque<Job>,

    /// Whether a driver task currently owns this queue
    running: bool,
}

/// A FIFO work queue for a single host
///
/// At most one task runs at a time. Tasks start in submission order, and once a
/// task finishes the next one starts after a delay drawn uniformly from
/// `[ceiling / 2, ceiling]`.
///
/// Only [`HostQueue::submit`] appends to the pending list and only the queue's
/// own driver pops from it. The driver is spawned on the first submission to an
/// idle queue and exits as soon as it finds the list empty.
pub struct HostQueue {
    host: String,
    ceiling: Duration,
    state: Mutex<QueueState>,
}

impl HostQueue {
    /// Creates an idle queue for `host`
    ///
    /// A ceiling of 10ms or less is replaced by [`MIN_CEILING`].
    pub fn new(host: impl Into<String>, ceiling: Duration) -> Arc<Self> {
        Arc::new(Self {
            host: host.into(),
            ceiling: ceiling.max(MIN_CEILING),
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                running: false,
            }),
        })
    }

    /// Enqueues a task and returns a future resolving to the task's output
    ///
    /// The task is appended when this method is called, not when the returned
    /// future is first polled, so call order is submission order. Dropping the
    /// returned future does not cancel the task: it still runs in its turn.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - Exactly what the task produced, including a task-level `Err`
    /// * `Err(QueueError::Abandoned)` - The task panicked or the runtime shut down
    pub fn submit<F, T>(
        self: &Arc<Self>,
        task: F,
    ) -> impl Future<Output = Result<T, QueueError>> + Send + 'static
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let output = task.await;
            // The caller may have stopped waiting; the result is simply discarded
            let _ = tx.send(output);
        });

        let start_driver = {
            let mut state = self.lock_state();
            state.pending.push_back(job);
            if state.running {
                false
            } else {
                state.running = true;
                true
            }
        };

        tracing::trace!(host = %self.host, start_driver, "Task submitted");
        if start_driver {
            tokio::spawn(Arc::clone(self).drive());
        }

        let host = self.host.clone();
        async move { rx.await.map_err(|_| QueueError::Abandoned { host }) }
    }

    /// Runs pending tasks one by one until the queue is empty
    async fn drive(self: Arc<Self>) {
        loop {
            let job = {
                let mut state = self.lock_state();
                match state.pending.pop_front() {
                    Some(job) => job,
                    None => {
                        state.running = false;
                        return;
                    }
                }
            };

            if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                tracing::error!(host = %self.host, "Queued task panicked");
            }

            let delay = self.next_delay();
            tracing::trace!(host = %self.host, ?delay, "Waiting before next task");
            tokio::time::sleep(delay).await;
        }
    }

    /// Samples the gap before the next task from `[ceiling / 2, ceiling]`
    fn next_delay(&self) -> Duration {
        rand::rng().random_range(self.ceiling / 2..=self.ceiling)
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The host key this queue throttles
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The effective (clamped) spacing ceiling
    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Number of submitted tasks that have not started yet
    pub fn pending_len(&self) -> usize {
        self.lock_state().pending.len()
    }

    /// Whether a driver is currently working through this queue
    pub fn is_running(&self) -> bool {
        self.lock_state().running
    }
}

impl fmt::Debug for HostQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("HostQueue")
            .field("host", &self.host)
            .field("ceiling", &self.ceiling)
            .field("pending", &state.pending.len())
            .field("running", &state.running)
            .finish()
    }
}

//! Bounded priority inference pool
//!
//! One process-wide pool for CPU-heavy inference. Submissions carry a
//! priority class; the queue is a priority queue with FIFO order within a
//! class. Cancellation is cooperative: work not yet started is skipped, a
//! started work item's result is discarded when the caller has gone away.

use parking_lot::Mutex;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Priority classes, highest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkPriority {
    Emergency = 0,
    ScheduledCall = 1,
    Chat = 2,
    Campaign = 3,
}

/// Cooperative cancellation for a queued work item
#[derive(Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

type BoxedWork = Pin<Box<dyn Future<Output = ()> + Send>>;

struct QueueEntry {
    priority: WorkPriority,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    work: BoxedWork,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    /// Max-heap: smaller (priority, seq) pops first
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .priority
            .cmp(&self.priority)
            .then(other.seq.cmp(&self.seq))
    }
}

/// Process-wide inference pool
pub struct InferencePool {
    queue: Mutex<BinaryHeap<QueueEntry>>,
    /// One permit per queued item
    items: Semaphore,
    seq: AtomicU64,
    depth: AtomicUsize,
    high_water: usize,
}

impl InferencePool {
    /// Start the pool with `workers` concurrent executors
    pub fn new(workers: usize, high_water: usize) -> Arc<Self> {
        let pool = Arc::new(Self {
            queue: Mutex::new(BinaryHeap::new()),
            items: Semaphore::new(0),
            seq: AtomicU64::new(0),
            depth: AtomicUsize::new(0),
            high_water,
        });

        for worker in 0..workers.max(1) {
            let pool = pool.clone();
            tokio::spawn(async move {
                tracing::debug!(worker, "Inference worker started");
                loop {
                    let Ok(permit) = pool.items.acquire().await else {
                        break;
                    };
                    permit.forget();

                    let entry = pool.queue.lock().pop();
                    let Some(entry) = entry else { continue };
                    pool.depth.fetch_sub(1, Ordering::SeqCst);

                    if entry.cancelled.load(Ordering::SeqCst) {
                        // Skipped before starting
                        continue;
                    }
                    entry.work.await;
                }
            });
        }

        pool
    }

    /// Submit work; the result arrives on the returned receiver.
    ///
    /// Dropping the receiver discards the result; calling
    /// [`CancelHandle::cancel`] additionally skips the work if it has not
    /// started yet.
    pub fn submit<T, F>(
        &self,
        priority: WorkPriority,
        work: F,
    ) -> (tokio::sync::oneshot::Receiver<T>, CancelHandle)
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let handle = CancelHandle::new();

        let entry = QueueEntry {
            priority,
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            cancelled: handle.cancelled.clone(),
            work: Box::pin(async move {
                let result = work.await;
                // Receiver gone: result discarded
                let _ = tx.send(result);
            }),
        };

        self.queue.lock().push(entry);
        self.depth.fetch_add(1, Ordering::SeqCst);
        self.items.add_permits(1);

        (rx, handle)
    }

    /// Items currently queued (not yet started)
    pub fn queue_depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Queue beyond the high-water mark; the supervisor rejects new sessions
    pub fn is_saturated(&self) -> bool {
        self.queue_depth() > self.high_water
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_work_executes() {
        let pool = InferencePool::new(2, 16);
        let (rx, _handle) = pool.submit(WorkPriority::Chat, async { 21 * 2 });
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_priority_ordering() {
        let pool = InferencePool::new(1, 64);
        let order = Arc::new(Mutex::new(Vec::new()));

        // Occupy the single worker so submissions queue up
        let (_gate_rx, _) = pool.submit(WorkPriority::Emergency, async {
            tokio::time::sleep(Duration::from_millis(50)).await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut receivers = Vec::new();
        for (priority, tag) in [
            (WorkPriority::Campaign, "campaign"),
            (WorkPriority::Chat, "chat-1"),
            (WorkPriority::Emergency, "emergency"),
            (WorkPriority::Chat, "chat-2"),
        ] {
            let order = order.clone();
            let (rx, _) = pool.submit(priority, async move {
                order.lock().push(tag);
            });
            receivers.push(rx);
        }

        for rx in receivers {
            let _ = rx.await;
        }

        let order = order.lock().clone();
        assert_eq!(order[0], "emergency");
        // FIFO within the chat class
        let chat_1 = order.iter().position(|t| *t == "chat-1").unwrap();
        let chat_2 = order.iter().position(|t| *t == "chat-2").unwrap();
        assert!(chat_1 < chat_2);
        assert_eq!(*order.last().unwrap(), "campaign");
    }

    #[tokio::test]
    async fn test_cancel_before_start_skips_work() {
        let pool = InferencePool::new(1, 16);
        let ran = Arc::new(AtomicBool::new(false));

        // Block the worker
        let (_blocker, _) = pool.submit(WorkPriority::Emergency, async {
            tokio::time::sleep(Duration::from_millis(50)).await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let ran_clone = ran.clone();
        let (rx, handle) = pool.submit(WorkPriority::Chat, async move {
            ran_clone.store(true, Ordering::SeqCst);
        });
        handle.cancel();

        // Receiver resolves with an error since the sender was dropped
        assert!(rx.await.is_err());
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_high_water_mark() {
        let pool = InferencePool::new(1, 2);

        let (_blocker, _) = pool.submit(WorkPriority::Emergency, async {
            tokio::time::sleep(Duration::from_millis(100)).await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!pool.is_saturated());

        let mut receivers = Vec::new();
        for _ in 0..4 {
            let (rx, _) = pool.submit(WorkPriority::Chat, async {});
            receivers.push(rx);
        }
        assert!(pool.is_saturated());
    }
}

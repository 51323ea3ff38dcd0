//! Priority queue of pending job ids shared by the scheduler's workers.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::{watch, Notify};

use crate::store::JobId;

/// Queue entry. Higher priority first; equal priorities in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedJob {
    pub job_id: JobId,
    pub priority: i32,
    seq: u64,
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct QueueInner {
    heap: BinaryHeap<QueuedJob>,
    /// Ids currently queued. Heap entries not in this set were removed and are skipped.
    queued: HashSet<JobId>,
    next_seq: u64,
    /// Jobs popped and not yet marked done.
    active: usize,
}

/// Single hand-off point between submission/restore and the job workers.
#[derive(Default)]
pub struct JobQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a job. Returns false if it is already queued.
    pub fn push(&self, job_id: JobId, priority: i32) -> bool {
        {
            let mut q = self.inner();
            if !q.queued.insert(job_id) {
                return false;
            }
            let seq = q.next_seq;
            q.next_seq += 1;
            q.heap.push(QueuedJob {
                job_id,
                priority,
                seq,
            });
        }
        self.notify.notify_one();
        true
    }

    /// Take the next job and count it as active until [`JobQueue::done`].
    pub fn pop(&self) -> Option<QueuedJob> {
        let mut q = self.inner();
        while let Some(job) = q.heap.pop() {
            if q.queued.remove(&job.job_id) {
                q.active += 1;
                return Some(job);
            }
        }
        None
    }

    /// Wait for the next job; `None` once `shutdown` is set.
    pub async fn pop_wait(&self, shutdown: &mut watch::Receiver<bool>) -> Option<QueuedJob> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if *shutdown.borrow() {
                return None;
            }
            if let Some(job) = self.pop() {
                return Some(job);
            }
            tokio::select! {
                _ = &mut notified => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
            }
        }
    }

    /// Mark a popped job finished.
    pub fn done(&self) {
        let mut q = self.inner();
        q.active = q.active.saturating_sub(1);
    }

    /// Drop a queued job. Returns false if it was not queued.
    pub fn remove(&self, job_id: JobId) -> bool {
        self.inner().queued.remove(&job_id)
    }

    pub fn len(&self) -> usize {
        self.inner().queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active(&self) -> usize {
        self.inner().active
    }

    /// Queued ids in dequeue order.
    pub fn snapshot_ids(&self) -> Vec<JobId> {
        let q = self.inner();
        let mut entries: Vec<QueuedJob> = q
            .heap
            .iter()
            .filter(|j| q.queued.contains(&j.job_id))
            .copied()
            .collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries.dedup_by_key(|j| j.job_id);
        entries.into_iter().map(|j| j.job_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn higher_priority_first_then_fifo() {
        let q = JobQueue::new();
        q.push(1, 0);
        q.push(2, 0);
        q.push(3, 5);
        q.push(4, 5);
        q.push(5, -1);
        assert_eq!(q.snapshot_ids(), vec![3, 4, 1, 2, 5]);
        let order: Vec<JobId> = std::iter::from_fn(|| q.pop().map(|j| j.job_id)).collect();
        assert_eq!(order, vec![3, 4, 1, 2, 5]);
        assert_eq!(q.active(), 5);
    }

    #[test]
    fn duplicate_push_is_ignored() {
        let q = JobQueue::new();
        assert!(q.push(7, 0));
        assert!(!q.push(7, 9));
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop().map(|j| j.priority), Some(0));
        assert!(q.pop().is_none());
    }

    #[test]
    fn removed_jobs_are_skipped_and_can_be_requeued() {
        let q = JobQueue::new();
        q.push(1, 0);
        q.push(2, 0);
        assert!(q.remove(1));
        assert!(!q.remove(1));
        assert_eq!(q.snapshot_ids(), vec![2]);
        q.push(1, 0);
        assert_eq!(q.snapshot_ids(), vec![2, 1]);
        assert_eq!(q.pop().map(|j| j.job_id), Some(2));
        assert_eq!(q.pop().map(|j| j.job_id), Some(1));
        assert!(q.pop().is_none());
    }

    #[tokio::test]
    async fn pop_wait_wakes_on_push_and_on_shutdown() {
        let q = Arc::new(JobQueue::new());
        let (tx, rx) = watch::channel(false);

        let waiter = {
            let q = Arc::clone(&q);
            let mut rx = rx.clone();
            tokio::spawn(async move { q.pop_wait(&mut rx).await.map(|j| j.job_id) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        q.push(42, 0);
        assert_eq!(waiter.await.unwrap(), Some(42));

        let waiter = {
            let q = Arc::clone(&q);
            let mut rx = rx.clone();
            tokio::spawn(async move { q.pop_wait(&mut rx).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send_replace(true);
        assert!(waiter.await.unwrap().is_none());
    }
}

//! Per-resource operation serializer.
//!
//! Every mutation of a shared file runs inside [`LockManager::with_lock`]
//! keyed by the file's canonical path. Operations on one key run one at a
//! time in arrival order; operations on different keys never wait on each
//! other. A key's queue lives only while something is running or waiting on
//! it.
//!
//! The FIFO guarantee comes from `tokio::sync::Mutex`, which grants the lock
//! to waiters in the order they called `lock()`.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Reserved key serializing every project-index mutation.
pub const INDEX_KEY: &str = "<project-index>";

/// Reserved key serializing git invocations against the shared working tree.
pub const VCS_KEY: &str = "<version-control>";

type Queue = Arc<tokio::sync::Mutex<()>>;

#[derive(Default)]
pub struct LockManager {
    queues: Mutex<HashMap<String, Queue>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` once every earlier operation on `key` has completed.
    pub async fn with_lock<F, Fut, T>(&self, key: &str, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        // Declared first so it drops last, after the guard and the handle.
        let _slot = Slot { manager: self, key };
        let queue = self.enter(key);
        let _guard = queue.lock().await;
        tracing::trace!(key, "lock acquired");
        op().await
    }

    /// Run `op` holding `key`, keyed by a path's string form.
    pub async fn with_path_lock<F, Fut, T>(&self, path: &Path, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.with_lock(&path.to_string_lossy(), op).await
    }

    /// Number of keys with a running or waiting operation.
    pub fn active_keys(&self) -> usize {
        self.queues.lock().map(|q| q.len()).unwrap_or(0)
    }

    fn enter(&self, key: &str) -> Queue {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(queues.entry(key.to_string()).or_default())
    }

    fn leave(&self, key: &str) {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        // Only the map holds the queue: nobody is running or waiting on it.
        if queues.get(key).is_some_and(|q| Arc::strong_count(q) == 1) {
            queues.remove(key);
        }
    }
}

/// Releases a key's map entry when an operation finishes or its future is
/// dropped while still waiting.
struct Slot<'a> {
    manager: &'a LockManager,
    key: &'a str,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        self.manager.leave(self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_runs_in_arrival_order() {
        let locks = Arc::new(LockManager::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..10 {
            let locks = Arc::clone(&locks);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                locks
                    .with_lock("doc", || async {
                        tokio::time::sleep(Duration::from_millis(2)).await;
                        order.lock().unwrap().push(i);
                    })
                    .await
            }));
            // Give each task time to enqueue before the next one arrives.
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_key_never_overlaps() {
        let locks = Arc::new(LockManager::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                locks
                    .with_lock("index", || async {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(1)).await;
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_run_in_parallel() {
        let locks = Arc::new(LockManager::new());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        // `a` blocks until `b` signals; this deadlocks unless they overlap.
        let locks_a = Arc::clone(&locks);
        let a = tokio::spawn(async move {
            locks_a
                .with_lock("a", || async move {
                    rx.await.unwrap();
                })
                .await
        });
        let locks_b = Arc::clone(&locks);
        let b = tokio::spawn(async move {
            locks_b
                .with_lock("b", || async move {
                    tx.send(()).unwrap();
                })
                .await
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            a.await.unwrap();
            b.await.unwrap();
        })
        .await
        .expect("distinct keys should not block each other");
    }

    #[tokio::test]
    async fn nested_keys_and_results() {
        let locks = LockManager::new();
        let value = locks
            .with_lock(INDEX_KEY, || async {
                locks.with_lock("index.json", || async { 41 + 1 }).await
            })
            .await;
        assert_eq!(value, 42);
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test]
    async fn cancelled_waiter_releases_key() {
        let locks = Arc::new(LockManager::new());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let holder_locks = Arc::clone(&locks);
        let holder = tokio::spawn(async move {
            holder_locks.with_lock("k", || async move { rx.await.ok() }).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let waiter = locks.with_lock("k", || async {});
        assert!(tokio::time::timeout(Duration::from_millis(10), waiter).await.is_err());

        tx.send(()).unwrap();
        holder.await.unwrap();
        assert_eq!(locks.active_keys(), 0);
    }
}

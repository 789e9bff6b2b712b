use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>;

/// One async mutex per poll id. Updates of the same poll queue up behind
/// each other; updates of different polls never contend.
///
/// An entry lives only while someone holds or waits on it, so ids of polls
/// that do not exist never pile up in the table.
#[derive(Debug, Default)]
pub struct PollLocks {
    table: Arc<LockTable>,
}

/// Held for the duration of one poll update.
#[derive(Debug)]
pub struct PollGuard {
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<LockTable>,
}

impl PollLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, poll_id: &str) -> PollGuard {
        let lock = lock_table(&self.table)
            .entry(poll_id.to_owned())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;
        PollGuard {
            guard: Some(guard),
            table: self.table.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        lock_table(&self.table).len()
    }
}

impl Drop for PollGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // the table's own reference is the last one: nobody holds or waits.
        // This also sweeps entries left by waiters that were cancelled.
        lock_table(&self.table).retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

// The table is never left half-written, so a poisoned lock is still usable.
fn lock_table(table: &LockTable) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_same_poll_is_serialized() {
        let locks = PollLocks::new();
        let _guard = locks.lock("poll1").await;

        let second = timeout(Duration::from_millis(50), locks.lock("poll1")).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_different_polls_do_not_contend() {
        let locks = PollLocks::new();
        let _guard = locks.lock("poll1").await;

        let other = timeout(Duration::from_millis(50), locks.lock("poll2")).await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_lock_released_on_drop() {
        let locks = PollLocks::new();
        drop(locks.lock("poll1").await);

        let again = timeout(Duration::from_millis(50), locks.lock("poll1")).await;
        assert!(again.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_read_modify_write_under_lock_loses_nothing() {
        let locks = Arc::new(PollLocks::new());
        let counter = Arc::new(std::sync::Mutex::new(0u32));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let locks = locks.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock("poll1").await;
                let read = *counter.lock().unwrap();
                tokio::task::yield_now().await;
                *counter.lock().unwrap() = read + 1;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*counter.lock().unwrap(), 32);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_entry_removed_once_released() {
        let locks = PollLocks::new();
        let guard = locks.lock("poll1").await;
        drop(locks.lock("poll2").await);
        assert_eq!(locks.len(), 1);

        drop(guard);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_entry_kept_while_someone_waits() {
        let locks = Arc::new(PollLocks::new());
        let guard = locks.lock("poll1").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("poll1").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // the waiter still shares the entry, so the same mutex is handed over
        drop(guard);
        waiter.await.unwrap();
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_is_swept() {
        let locks = PollLocks::new();
        let guard = locks.lock("poll1").await;

        let gave_up = timeout(Duration::from_millis(20), locks.lock("poll1")).await;
        assert!(gave_up.is_err());

        drop(guard);
        assert_eq!(locks.len(), 0);
    }
}

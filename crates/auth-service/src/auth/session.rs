//! Per-user session locks

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// One async mutex per user id. Holding the guard makes the holder the only
/// writer of that user's ledger rows in this process.
///
/// Entries live only while some task holds or awaits them, so the map does
/// not grow with the number of users ever seen.
#[derive(Default)]
pub struct SessionLocks {
    locks: Arc<LockMap>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: &str) -> SessionGuard {
        let lock = self
            .locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;

        SessionGuard {
            guard: Some(guard),
            user_id: user_id.to_string(),
            locks: self.locks.clone(),
        }
    }

    /// Number of users with a lock currently held or awaited.
    pub fn tracked_users(&self) -> usize {
        self.locks.len()
    }
}

/// Exclusive hold on one user's sessions. Dropping it releases the lock and
/// forgets the entry once no other task refers to it.
pub struct SessionGuard {
    guard: Option<OwnedMutexGuard<()>>,
    user_id: String,
    locks: Arc<LockMap>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone, so a count of 1 is the map's alone.
        self.locks
            .remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

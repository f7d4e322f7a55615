use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tokio::sync::{Mutex, MutexGuard};

/// Fixed set of async mutexes addressed by hashing an entity id
///
/// Two ids landing on the same stripe serialize against each other, so a
/// caller must never hold two guards from the same set at once.
pub(crate) struct StripedLocks {
    stripes: Vec<Mutex<()>>,
}

impl StripedLocks {
    pub(crate) fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    pub(crate) async fn lock(&self, key: &str) -> MutexGuard<'_, ()> {
        self.stripes[self.index(key)].lock().await
    }

    fn index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_maps_to_same_stripe() {
        let locks = StripedLocks::new(16);
        assert_eq!(locks.index("task-1"), locks.index("task-1"));
        assert!(locks.index("task-2") < 16);
    }

    #[test]
    fn zero_stripes_is_clamped() {
        let locks = StripedLocks::new(0);
        assert_eq!(locks.stripes.len(), 1);
        assert_eq!(locks.index("anything"), 0);
    }

    #[tokio::test]
    async fn guard_excludes_second_locker_until_dropped() {
        let locks = StripedLocks::new(1);
        let guard = locks.lock("a").await;

        assert!(locks.stripes[0].try_lock().is_err());
        drop(guard);
        assert!(locks.stripes[0].try_lock().is_ok());
    }
}

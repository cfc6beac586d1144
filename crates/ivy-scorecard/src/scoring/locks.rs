use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

/// Serializes work per key while letting different keys proceed concurrently.
pub(crate) struct KeyedLocks<K> {
    inflight: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn with_lock<T>(&self, key: &K, work: impl FnOnce() -> T) -> T {
        self.with_locks(std::slice::from_ref(key), work)
    }

    /// Holds every key's lock, acquired in slice order, for the duration of `work`.
    pub(crate) fn with_locks<T>(&self, keys: &[K], work: impl FnOnce() -> T) -> T {
        let locks: Vec<Arc<Mutex<()>>> = {
            let mut inflight = self
                .inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            keys.iter()
                .map(|key| {
                    Arc::clone(
                        inflight
                            .entry(key.clone())
                            .or_insert_with(|| Arc::new(Mutex::new(()))),
                    )
                })
                .collect()
        };
        // The guarded unit carries no data, so a panicked holder leaves nothing to repair.
        let _guards: Vec<_> = locks
            .iter()
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner))
            .collect();
        work()
    }

    /// Drops idle entries matching `predicate`.
    pub(crate) fn forget(&self, predicate: impl Fn(&K) -> bool) {
        let mut inflight = self
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        inflight.retain(|key, lock| !(predicate(key) && Arc::strong_count(lock) == 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn same_key_work_never_overlaps() {
        let locks = Arc::new(KeyedLocks::<&'static str>::new());
        let active = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let active = Arc::clone(&active);
                let overlaps = Arc::clone(&overlaps);
                thread::spawn(move || {
                    locks.with_lock(&"enr-1:2", || {
                        if active.fetch_add(1, Ordering::SeqCst) > 0 {
                            overlaps.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::sleep(std::time::Duration::from_millis(2));
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker finished");
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn multi_key_holder_excludes_single_key_work() {
        let locks = Arc::new(KeyedLocks::<u8>::new());
        let finished = Arc::new(AtomicUsize::new(0));

        let worker = locks.with_locks(&[1, 2, 3], || {
            let locks = Arc::clone(&locks);
            let worker_finished = Arc::clone(&finished);
            let worker = thread::spawn(move || {
                locks.with_lock(&2, || worker_finished.fetch_add(1, Ordering::SeqCst));
            });
            thread::sleep(std::time::Duration::from_millis(20));
            assert_eq!(finished.load(Ordering::SeqCst), 0);
            worker
        });

        worker.join().expect("worker finished");
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn forget_removes_idle_keys() {
        let locks = KeyedLocks::<String>::new();
        locks.with_lock(&"enr-1".to_string(), || ());
        locks.with_lock(&"enr-2".to_string(), || ());
        locks.forget(|key| key == "enr-1");

        let inflight = locks.inflight.lock().expect("lock table");
        assert!(!inflight.contains_key("enr-1"));
        assert!(inflight.contains_key("enr-2"));
    }
}

use std::sync::{Arc, Mutex, PoisonError};

/// Holds an immutable snapshot that readers load whole and writers replace
/// whole. Readers never observe a partially applied update.
pub struct SnapshotCell<T> {
    current: Mutex<Arc<T>>,
}

impl<T: Clone> SnapshotCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            current: Mutex::new(Arc::new(value)),
        }
    }

    pub fn load(&self) -> Arc<T> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies `f` to a copy of the current value and publishes it.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = T::clone(&guard);
        let result = f(&mut next);
        *guard = Arc::new(next);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loaded_snapshot_is_unaffected_by_later_updates() {
        let cell = SnapshotCell::new(vec![1, 2]);
        let before = cell.load();
        cell.update(|v| v.push(3));
        assert_eq!(*before, vec![1, 2]);
        assert_eq!(*cell.load(), vec![1, 2, 3]);
    }

    #[test]
    fn test_update_returns_closure_result() {
        let cell = SnapshotCell::new(5);
        let old = cell.update(|v| std::mem::replace(v, 7));
        assert_eq!(old, 5);
        assert_eq!(*cell.load(), 7);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let cell = Arc::new(SnapshotCell::new(0u32));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cell = cell.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        cell.update(|v| *v += 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*cell.load(), 1000);
    }
}

//! Sharing a simulator between threads.
//!
//! The simulators are plain single-threaded state machines. [`Shared`] puts
//! one instance behind one lock; there is no finer-grained locking.

use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct Shared<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Shared { inner: Arc::new(Mutex::new(value)) }
    }

    /// Lock the simulator. A poisoned lock is recovered: every operation
    /// completes its mutation before anything that could panic.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with the lock held
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock())
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared { inner: Arc::clone(&self.inner) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replacement::VirtualPageId;
    use crate::vm_manager::VirtualMemoryManager;
    use std::thread;

    #[test]
    fn test_shared_manager_across_threads() {
        let shared = Shared::new(VirtualMemoryManager::default());
        shared.with(|vm| vm.load_process(1, (0..8).map(VirtualPageId)));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for p in 0..8 {
                        shared
                            .with(|vm| vm.access_page(1, VirtualPageId((p + t) % 8), false, &[]))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = shared.lock().statistics();
        assert_eq!(stats.replacement.total_accesses, 32);
        assert_eq!(stats.swap_ins, stats.replacement.page_faults);
    }
}

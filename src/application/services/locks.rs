//! Per-response serialization of tree operations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::ResponseId;

/// One mutex per response id.
///
/// Operations on the same response run one at a time; different responses
/// proceed in parallel.
#[derive(Debug, Default)]
pub struct ResponseLocks {
    locks: Mutex<HashMap<ResponseId, Arc<Mutex<()>>>>,
}

impl ResponseLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, response: ResponseId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(response).or_default().clone()
    }

    /// Run `f` while holding the locks of every distinct response.
    ///
    /// Locks are taken in ascending id order.
    pub fn run<T>(&self, responses: &[ResponseId], f: impl FnOnce() -> T) -> T {
        let mut ids = responses.to_vec();
        ids.sort();
        ids.dedup();

        let handles: Vec<Arc<Mutex<()>>> = ids.iter().map(|&id| self.handle(id)).collect();
        let result = {
            let _guards: Vec<MutexGuard<'_, ()>> = handles
                .iter()
                .map(|h| h.lock().unwrap_or_else(|e| e.into_inner()))
                .collect();
            f()
        };
        drop(handles);
        self.release(&ids);
        result
    }

    /// Forget locks nobody else holds a handle to.
    fn release(&self, ids: &[ResponseId]) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        for id in ids {
            if locks.get(id).is_some_and(|h| Arc::strong_count(h) == 1) {
                locks.remove(id);
            }
        }
    }

    #[cfg(test)]
    fn registered(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn given_concurrent_runs_on_same_response_when_running_then_never_overlap() {
        let locks = Arc::new(ResponseLocks::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let active = Arc::clone(&active);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    locks.run(&[ResponseId(1), ResponseId(1)], || {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        thread::yield_now();
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn given_finished_runs_when_checking_registry_then_locks_are_released() {
        let locks = ResponseLocks::new();

        for id in 0..100 {
            locks.run(&[ResponseId(id), ResponseId(id + 1)], || ());
        }

        assert_eq!(locks.registered(), 0);
    }

    #[test]
    fn given_nested_run_on_other_response_when_outer_finishes_then_registry_is_empty() {
        let locks = ResponseLocks::new();

        let inner_registered = locks.run(&[ResponseId(1)], || {
            locks.run(&[ResponseId(2)], || ());
            locks.registered()
        });

        assert_eq!(inner_registered, 1);
        assert_eq!(locks.registered(), 0);
    }
}

//! Memoization of resolution outcomes.
//!
//! [`ResolutionCache`] stores exactly one outcome per specifier, success or
//! failure. A single lock covers the lookup, the resolution and the write, so
//! concurrent callers asking for the same specifier observe one resolution.

use std::collections::HashMap;

use parking_lot::Mutex;

use jsmod_common::ResolveError;

/// Outcome stored for one specifier.
#[derive(Debug, Clone)]
enum CacheEntry<T> {
    /// The specifier resolved to a record.
    Resolved(T),
    /// Resolution failed; the failure is terminal for this session.
    Failed(ResolveError),
}

impl<T> CacheEntry<T> {
    /// Convert the entry into a `Result`.
    fn into_result(self) -> Result<T, ResolveError> {
        match self {
            CacheEntry::Resolved(record) => Ok(record),
            CacheEntry::Failed(err) => Err(err),
        }
    }
}

impl<T> From<Result<T, ResolveError>> for CacheEntry<T> {
    fn from(result: Result<T, ResolveError>) -> Self {
        match result {
            Ok(record) => CacheEntry::Resolved(record),
            Err(err) => CacheEntry::Failed(err),
        }
    }
}

/// Write-once cache keyed by specifier.
#[derive(Debug)]
pub struct ResolutionCache<T> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
}

impl<T> Default for ResolutionCache<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> ResolutionCache<T> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached outcome for `specifier`, or run `resolve` and cache its outcome.
    ///
    /// The lock is held while `resolve` runs. `resolve` must not call back into
    /// the same cache.
    pub fn get_or_resolve<F>(&self, specifier: &str, resolve: F) -> Result<T, ResolveError>
    where
        F: FnOnce() -> Result<T, ResolveError>,
    {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(specifier) {
            return entry.clone().into_result();
        }

        let outcome = resolve();
        entries.insert(specifier.to_string(), CacheEntry::from(outcome.clone()));
        outcome
    }

    /// Number of specifiers with a stored outcome.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing has been resolved yet.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_success_is_memoized() {
        let cache = ResolutionCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_resolve("a.js", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("record-a".to_string())
                })
                .unwrap();
            assert_eq!(value, "record-a");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failure_is_memoized() {
        let cache: ResolutionCache<String> = ResolutionCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let err = cache
                .get_or_resolve("missing.js", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ResolveError::not_found("missing.js"))
                })
                .unwrap_err();
            assert!(err.is_not_found());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_entry_never_overwritten() {
        let cache = ResolutionCache::new();
        cache.get_or_resolve("a.js", || Ok(1)).unwrap();

        let second = cache.get_or_resolve("a.js", || Ok(2)).unwrap();
        assert_eq!(second, 1);
    }

    #[test]
    fn test_concurrent_same_specifier_resolves_once() {
        let cache = Arc::new(ResolutionCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_resolve("shared.js", || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok("shared".to_string())
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "shared");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_distinct_specifiers() {
        let cache = Arc::new(ResolutionCache::new());

        thread::scope(|scope| {
            for i in 0..16 {
                let cache = Arc::clone(&cache);
                scope.spawn(move || {
                    let key = format!("m{i}.js");
                    cache.get_or_resolve(&key, || Ok(i)).unwrap();
                });
            }
        });

        assert_eq!(cache.len(), 16);
        assert_eq!(cache.get_or_resolve("m7.js", || Ok(0)).unwrap(), 7);
    }
}

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::fs::{normalize_path, to_slash};

use super::{Resolution, Resolver};

/// Memoizes another resolver's results by (containing directory, specifier).
///
/// Resolution only depends on the containing directory, so sibling files
/// share entries. Entries live as long as the cache; build a new one to
/// pick up file-system changes.
pub struct CachedResolver<R> {
    inner: R,
    cache: Mutex<HashMap<(PathBuf, String), Resolution>>,
}

impl<R: Resolver> CachedResolver<R> {
    pub fn new(inner: R) -> Self {
        CachedResolver {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: Resolver> Resolver for CachedResolver<R> {
    fn resolve(&self, import_source: &str, from_file: &Path) -> Resolution {
        let from_file = normalize_path(&to_slash(&from_file.to_string_lossy()));
        let dir = from_file.parent().unwrap_or(Path::new("/")).to_path_buf();
        let key = (dir, import_source.to_string());

        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&key) {
                tracing::trace!(specifier = import_source, "resolution cache hit");
                return hit.clone();
            }
        }

        // Resolve outside the lock; a racing duplicate computes the same value
        let resolution = self.inner.resolve(import_source, &from_file);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, resolution.clone());
        }
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::UnresolvedReason;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingResolver {
        calls: AtomicUsize,
    }

    impl Resolver for CountingResolver {
        fn resolve(&self, import_source: &str, from_file: &Path) -> Resolution {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match import_source {
                "./missing" => {
                    Resolution::Unresolved(UnresolvedReason::FileNotFound(import_source.into()))
                }
                _ => Resolution::Resolved(
                    from_file
                        .parent()
                        .unwrap()
                        .join(format!("{}.ts", import_source.trim_start_matches("./"))),
                ),
            }
        }
    }

    fn counting() -> CachedResolver<CountingResolver> {
        CachedResolver::new(CountingResolver {
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_same_directory_shares_entries() {
        let cached = counting();
        let first = cached.resolve("./util", Path::new("/p/src/a.ts"));
        let second = cached.resolve("./util", Path::new("/p/src/b.ts"));
        assert_eq!(first, second);
        assert_eq!(first, Resolution::Resolved(PathBuf::from("/p/src/util.ts")));
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.len(), 1);
    }

    #[test]
    fn test_different_directories_are_separate() {
        let cached = counting();
        cached.resolve("./util", Path::new("/p/src/a.ts"));
        cached.resolve("./util", Path::new("/p/lib/a.ts"));
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unresolved_results_are_cached() {
        let cached = counting();
        let first = cached.resolve("./missing", Path::new("/p/src/a.ts"));
        let second = cached.resolve("./missing", Path::new("/p/src/a.ts"));
        assert!(!first.is_resolved());
        assert_eq!(first, second);
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 1);
    }
}

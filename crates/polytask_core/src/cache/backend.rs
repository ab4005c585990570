//! Key-value backend contract with per-entry TTL.

use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub type CacheResult<T> = Result<T, CacheError>;

/// Transport failure from a cache backend.
///
/// Never escapes the cache layer; callers observe a miss or a no-op.
#[derive(Debug)]
pub enum CacheError {
    Backend(String),
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backend(message) => write!(f, "cache backend failure: {message}"),
        }
    }
}

impl Error for CacheError {}

/// Minimal TTL key-value contract the cache layer runs against.
///
/// Any store honoring this contract is acceptable; no specific product
/// is mandated. Values are opaque serialized strings.
pub trait CacheBackend {
    fn get(&self, key: &str) -> CacheResult<Option<String>>;
    fn put(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;
    fn delete(&self, key: &str) -> CacheResult<()>;
    /// Deletes every entry whose key starts with `prefix`. Used for the
    /// coarse owner-scoped list eviction, since list keys embed an
    /// unbounded filter fingerprint space.
    fn delete_prefix(&self, prefix: &str) -> CacheResult<()>;
}

impl<B: CacheBackend + ?Sized> CacheBackend for &B {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        (**self).put(key, value, ttl)
    }

    fn delete(&self, key: &str) -> CacheResult<()> {
        (**self).delete(key)
    }

    fn delete_prefix(&self, prefix: &str) -> CacheResult<()> {
        (**self).delete_prefix(prefix)
    }
}

struct StoredEntry {
    value: String,
    expires_at: Instant,
}

/// In-process TTL map backend.
///
/// Entries are evicted lazily on read; an expired entry behaves exactly
/// like an absent one.
#[derive(Default)]
pub struct MemoryCacheBackend {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, HashMap<String, StoredEntry>>> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Backend("cache mutex poisoned".to_string()))
    }
}

impl CacheBackend for MemoryCacheBackend {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut entries = self.lock()?;
        entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<()> {
        let mut entries = self.lock()?;
        entries.remove(key);
        Ok(())
    }

    fn delete_prefix(&self, prefix: &str) -> CacheResult<()> {
        let mut entries = self.lock()?;
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CacheBackend, MemoryCacheBackend};
    use std::time::Duration;

    #[test]
    fn put_get_delete_roundtrip() {
        let backend = MemoryCacheBackend::new();
        backend.put("k", "v", Duration::from_secs(60)).unwrap();
        assert_eq!(backend.get("k").unwrap().as_deref(), Some("v"));

        backend.delete("k").unwrap();
        assert_eq!(backend.get("k").unwrap(), None);
    }

    #[test]
    fn expired_entry_reads_as_miss() {
        let backend = MemoryCacheBackend::new();
        backend.put("k", "v", Duration::from_millis(0)).unwrap();
        assert_eq!(backend.get("k").unwrap(), None);
    }

    #[test]
    fn delete_prefix_only_touches_matching_keys() {
        let backend = MemoryCacheBackend::new();
        backend.put("a.1", "x", Duration::from_secs(60)).unwrap();
        backend.put("a.2", "y", Duration::from_secs(60)).unwrap();
        backend.put("b.1", "z", Duration::from_secs(60)).unwrap();

        backend.delete_prefix("a.").unwrap();
        assert_eq!(backend.get("a.1").unwrap(), None);
        assert_eq!(backend.get("a.2").unwrap(), None);
        assert_eq!(backend.get("b.1").unwrap().as_deref(), Some("z"));
    }
}

//! Owner-scoped task view cache.

use crate::cache::backend::{CacheBackend, CacheResult};
use crate::model::task::{OwnerId, Task, TaskDetail, TaskId};
use crate::repo::task_repo::{TaskPage, TaskStatistics};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const LIST_KEY_PREFIX: &str = "tasks.list.";
const DETAIL_KEY_PREFIX: &str = "tasks.detail.";
const STATS_KEY_PREFIX: &str = "tasks.stats.";
const HEALTH_KEY: &str = "tasks.health.probe";

/// Cached list/detail/statistics views over one `CacheBackend`.
///
/// Every operation absorbs backend failures: reads degrade to misses,
/// writes and evictions to no-ops, with a warning logged. Callers never
/// see a cache error.
pub struct TaskCache<B: CacheBackend> {
    backend: B,
    ttl: Duration,
}

impl<B: CacheBackend> TaskCache<B> {
    /// Creates a cache writing entries with the given TTL backstop.
    pub fn new(backend: B, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn get_list(&self, owner: OwnerId, fingerprint: &str) -> Option<TaskPage> {
        self.read(&list_key(owner, fingerprint))
    }

    pub fn put_list(&self, owner: OwnerId, fingerprint: &str, page: &TaskPage) {
        self.write(&list_key(owner, fingerprint), page);
    }

    pub fn get_detail(&self, id: TaskId) -> Option<TaskDetail> {
        self.read(&detail_key(id))
    }

    pub fn put_detail(&self, detail: &TaskDetail) {
        self.write(&detail_key(detail.task.uuid), detail);
    }

    pub fn get_stats(&self, owner: OwnerId) -> Option<TaskStatistics> {
        self.read(&stats_key(owner))
    }

    pub fn put_stats(&self, owner: OwnerId, stats: &TaskStatistics) {
        self.write(&stats_key(owner), stats);
    }

    /// Evicts every view a mutation of `task` can have gone stale.
    ///
    /// List entries are evicted per owner as a whole: the filter space is
    /// unbounded, so individual list keys are not addressable. The parent
    /// and children relations are passed in by the caller so eviction
    /// stays store-agnostic. Idempotent: a second call observes the same
    /// (empty) end state.
    pub fn invalidate_for_task(&self, task: &Task, parent: Option<&Task>, children: &[Task]) {
        self.evict(&detail_key(task.uuid));
        self.evict_prefix(&owner_list_prefix(task.owner_uuid));
        self.evict(&stats_key(task.owner_uuid));

        if let Some(parent) = parent {
            self.evict(&detail_key(parent.uuid));
            // Same owner in this domain; kept generic for hierarchy reuse.
            self.evict_prefix(&owner_list_prefix(parent.owner_uuid));
            self.evict(&stats_key(parent.owner_uuid));
        }

        for child in children {
            self.evict(&detail_key(child.uuid));
        }
    }

    /// Synthetic put/get/delete round-trip. Returns whether the backend
    /// behaved; never errors.
    pub fn health_check(&self) -> bool {
        let outcome: CacheResult<bool> = (|| {
            self.backend.put(HEALTH_KEY, "ok", self.ttl)?;
            let read = self.backend.get(HEALTH_KEY)?;
            self.backend.delete(HEALTH_KEY)?;
            Ok(read.as_deref() == Some("ok"))
        })();

        match outcome {
            Ok(healthy) => healthy,
            Err(err) => {
                warn!("event=cache_health module=cache status=error error={err}");
                false
            }
        }
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key) {
            Ok(value) => value?,
            Err(err) => {
                warn!("event=cache_get module=cache status=error key={key} error={err}");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                // A payload this layer cannot decode is as good as absent;
                // drop it so the next write replaces it.
                warn!("event=cache_decode module=cache status=error key={key} error={err}");
                self.evict(key);
                None
            }
        }
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!("event=cache_encode module=cache status=error key={key} error={err}");
                return;
            }
        };

        if let Err(err) = self.backend.put(key, &encoded, self.ttl) {
            warn!("event=cache_put module=cache status=error key={key} error={err}");
        } else {
            debug!("event=cache_put module=cache status=ok key={key}");
        }
    }

    fn evict(&self, key: &str) {
        if let Err(err) = self.backend.delete(key) {
            warn!("event=cache_evict module=cache status=error key={key} error={err}");
        }
    }

    fn evict_prefix(&self, prefix: &str) {
        if let Err(err) = self.backend.delete_prefix(prefix) {
            warn!("event=cache_evict module=cache status=error prefix={prefix} error={err}");
        }
    }
}

fn list_key(owner: OwnerId, fingerprint: &str) -> String {
    format!("{}{owner}.{fingerprint}", LIST_KEY_PREFIX)
}

fn owner_list_prefix(owner: OwnerId) -> String {
    format!("{}{owner}.", LIST_KEY_PREFIX)
}

fn detail_key(id: TaskId) -> String {
    format!("{}{id}", DETAIL_KEY_PREFIX)
}

fn stats_key(owner: OwnerId) -> String {
    format!("{}{owner}", STATS_KEY_PREFIX)
}

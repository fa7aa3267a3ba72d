//! In-memory cache of loaded (partition, tenant) entries.

use crate::BlockMeta;
use crate::partition::PartitionKey;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

/// Cache granularity: one entry per (partition, tenant) pair. Mixed blocks
/// live under the empty tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    pub partition: PartitionKey,
    pub tenant: String,
}

impl CacheKey {
    pub fn new(partition: PartitionKey, tenant: &str) -> Self {
        Self {
            partition,
            tenant: tenant.to_string(),
        }
    }
}

/// Blocks of one shard, keyed by block id.
#[derive(Debug, Default)]
pub(crate) struct ShardBlocks {
    pub blocks: HashMap<String, BlockMeta>,
}

/// A materialized (partition, tenant) entry: every shard of the partition
/// that has data for the tenant.
#[derive(Debug)]
pub(crate) struct LoadedPartition {
    pub partition: PartitionKey,
    pub accessed_at: Instant,
    pub shards: HashMap<u32, ShardBlocks>,
}

impl LoadedPartition {
    pub fn new(partition: PartitionKey) -> Self {
        Self {
            partition,
            accessed_at: Instant::now(),
            shards: HashMap::new(),
        }
    }
}

/// Tenant-keyed LRU of loaded partitions.
///
/// Each tenant retains at most `capacity` entries, except that the partition
/// covering the current wall-clock time is pinned: it receives continuous
/// writes and evicting it would force an immediate reload.
#[derive(Debug)]
pub(crate) struct PartitionCache {
    entries: HashMap<CacheKey, LoadedPartition>,
    capacity: usize,
}

impl PartitionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of loaded entries belonging to one tenant.
    #[cfg(test)]
    pub fn tenant_len(&self, tenant: &str) -> usize {
        self.entries.keys().filter(|k| k.tenant == tenant).count()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get_mut(&mut self, key: &CacheKey) -> Option<&mut LoadedPartition> {
        self.entries.get_mut(key)
    }

    /// Returns the entry for `key`, creating an empty one if absent.
    pub fn get_or_insert(&mut self, key: CacheKey, partition: PartitionKey) -> &mut LoadedPartition {
        self.entries
            .entry(key)
            .or_insert_with(|| LoadedPartition::new(partition))
    }

    pub fn insert(&mut self, key: CacheKey, entry: LoadedPartition) {
        self.entries.insert(key, entry);
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<LoadedPartition> {
        self.entries.remove(key)
    }

    /// Marks the entry as just used so it is never an eviction candidate in
    /// its own pass.
    pub fn touch(&mut self, key: &CacheKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.accessed_at = Instant::now();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Evicts least-recently-used entries of any tenant holding more than
    /// `capacity` loaded partitions. The entry named by `protect` and any
    /// partition containing `now_millis` are exempt, so a tenant may stay one
    /// entry over budget while its active partition is pinned.
    pub fn evict_excess(&mut self, protect: &CacheKey, now_millis: i64) {
        let mut by_tenant: HashMap<&str, Vec<(Instant, &CacheKey)>> = HashMap::new();
        for (key, entry) in &self.entries {
            by_tenant
                .entry(key.tenant.as_str())
                .or_default()
                .push((entry.accessed_at, key));
        }

        let mut victims = Vec::new();
        for (_, mut loaded) in by_tenant {
            if loaded.len() <= self.capacity {
                continue;
            }
            loaded.sort_by_key(|(accessed_at, _)| *accessed_at);
            let mut excess = loaded.len() - self.capacity;
            for (_, key) in loaded {
                if excess == 0 {
                    break;
                }
                if key == protect || key.partition.contains(now_millis) {
                    continue;
                }
                victims.push(key.clone());
                excess -= 1;
            }
        }

        for key in victims {
            debug!(partition = %key.partition, tenant = %key.tenant, "evicting loaded partition");
            self.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    const HOUR: i64 = 3_600_000;

    fn key_at(hour: i64, tenant: &str) -> CacheKey {
        CacheKey::new(
            PartitionKey {
                ts: hour * HOUR,
                duration: HOUR,
            },
            tenant,
        )
    }

    fn load(cache: &mut PartitionCache, key: &CacheKey) {
        cache.insert(key.clone(), LoadedPartition::new(key.partition));
        // Instant has nanosecond resolution but platforms differ; keep
        // access times strictly ordered.
        thread::sleep(Duration::from_millis(2));
    }

    #[test]
    fn evicts_least_recently_used_beyond_capacity() {
        let mut cache = PartitionCache::new(2);
        let (p1, p2, p3) = (
            key_at(1, "tenant-a"),
            key_at(2, "tenant-a"),
            key_at(3, "tenant-a"),
        );

        load(&mut cache, &p1);
        load(&mut cache, &p2);
        load(&mut cache, &p3);
        cache.evict_excess(&p3, i64::MAX - HOUR);

        assert!(!cache.contains(&p1), "oldest entry should be evicted");
        assert!(cache.contains(&p2));
        assert!(cache.contains(&p3));
    }

    #[test]
    fn budget_applies_per_tenant() {
        let mut cache = PartitionCache::new(2);
        for hour in 1..=3 {
            load(&mut cache, &key_at(hour, "tenant-a"));
        }
        let other = key_at(1, "tenant-b");
        load(&mut cache, &other);
        cache.evict_excess(&other, i64::MAX - HOUR);

        assert_eq!(cache.tenant_len("tenant-a"), 2);
        assert_eq!(cache.tenant_len("tenant-b"), 1);
    }

    #[test]
    fn active_partition_is_pinned() {
        let mut cache = PartitionCache::new(2);
        let active = key_at(1, "tenant-a");
        let now = active.partition.ts + 1;

        load(&mut cache, &active);
        let p2 = key_at(2, "tenant-a");
        let p3 = key_at(3, "tenant-a");
        load(&mut cache, &p2);
        load(&mut cache, &p3);
        cache.evict_excess(&p3, now);

        assert!(cache.contains(&active), "active partition must survive");
        assert!(!cache.contains(&p2), "next-oldest entry evicted instead");
        assert!(cache.contains(&p3));
    }

    #[test]
    fn protected_entry_survives_even_as_oldest() {
        let mut cache = PartitionCache::new(1);
        let p1 = key_at(1, "tenant-a");
        let p2 = key_at(2, "tenant-a");

        load(&mut cache, &p1);
        load(&mut cache, &p2);
        cache.evict_excess(&p1, i64::MAX - HOUR);

        assert!(cache.contains(&p1), "protected entry must survive");
        assert!(!cache.contains(&p2), "budget is met by evicting the next candidate");
    }
}

//! The block-metadata index engine.

use crate::cache::{CacheKey, LoadedPartition, PartitionCache};
use crate::concurrency::{self, CancelToken};
use crate::error::{Result, StrataError};
use crate::partition::{PartitionKey, PartitionMeta, block_timestamp_millis};
use crate::store::Store;
use crate::{BlockList, BlockMeta, CompactedBlocks};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::thread;
use std::time::Duration;
use tracing::{error, info};

/// Index configuration.
///
/// A fixed cache size gives a bounded memory footprint; changing the
/// partition duration between process epochs is legal and handled by the
/// lookup paths, though it reduces cache effectiveness.
#[derive(Debug, Clone)]
pub struct Config {
    /// Width of a time partition.
    pub partition_duration: Duration,
    /// How many partitions to keep loaded in memory, per tenant.
    pub partition_cache_size: usize,
    /// Slack added on both sides of a range query to cover blocks whose
    /// payload time extends outside their creation partition.
    pub query_lookaround_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            partition_duration: Duration::from_secs(24 * 3600),
            partition_cache_size: 7,
            query_lookaround_period: Duration::from_secs(3600),
        }
    }
}

impl Config {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the partition duration.
    pub fn with_partition_duration(mut self, duration: Duration) -> Self {
        self.partition_duration = duration;
        self
    }

    /// Sets the per-tenant cache budget.
    pub fn with_partition_cache_size(mut self, size: usize) -> Self {
        self.partition_cache_size = size;
        self
    }

    /// Sets the range-query lookaround period.
    pub fn with_query_lookaround_period(mut self, period: Duration) -> Self {
        self.query_lookaround_period = period;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.partition_duration < Duration::from_secs(1) {
            return Err(StrataError::InvalidConfiguration(
                "partition_duration must be at least one second".to_string(),
            ));
        }
        if self.partition_cache_size == 0 {
            return Err(StrataError::InvalidConfiguration(
                "partition_cache_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn lookaround_millis(&self) -> i64 {
        self.query_lookaround_period.as_millis() as i64
    }
}

/// Time-partitioned index over block metadata.
///
/// Data is partitioned by time, shard and tenant. Partition identifiers name
/// the period they cover: `"20240923T16.1h"` is the one-hour period starting
/// at 2024-09-23T16:00:00.000Z. Partitions are mostly transparent to
/// callers, though [`PartitionMeta`] is exposed for iteration.
///
/// The index requires a backing [`Store`] and reads through an in-memory
/// cache: entries load on demand during lookups and inserts, and the least
/// recently used ones are evicted per tenant once the cache budget is
/// exceeded. Every operation runs under a single coarse mutex and performs
/// all substrate access through the transaction handed in by the caller, who
/// decides commit or abort after the call returns.
pub struct Index<S: Store> {
    config: Config,
    store: S,
    state: Mutex<State>,
}

struct State {
    /// Every partition known to the store, sorted by `(ts, duration)`.
    all_partitions: Vec<PartitionMeta>,
    loaded: PartitionCache,
}

impl State {
    fn has_partition(&self, key: PartitionKey) -> bool {
        self.all_partitions
            .binary_search_by_key(&key, |meta| meta.key)
            .is_ok()
    }

    /// Removes the block from the loaded entry, if any. Returns true if a
    /// block was actually present.
    fn try_delete(&mut self, key: PartitionKey, shard: u32, tenant: &str, block_id: &str) -> bool {
        if !self.has_partition(key) {
            return false;
        }
        let cache_key = CacheKey::new(key, tenant);
        let Some(entry) = self.loaded.get_mut(&cache_key) else {
            return false;
        };
        let Some(shard_blocks) = entry.shards.get_mut(&shard) else {
            return false;
        };
        shard_blocks.blocks.remove(block_id).is_some()
    }
}

impl<S: Store> Index<S> {
    /// Creates an index over the given substrate.
    pub fn new(store: S, config: Config) -> Result<Self> {
        config.validate()?;
        let loaded = PartitionCache::new(config.partition_cache_size);
        Ok(Self {
            config,
            store,
            state: Mutex::new(State {
                all_partitions: Vec::new(),
                loaded,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The backing substrate, for transaction management.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Asks the store to create its namespaces. Idempotent.
    pub fn init(&self, tx: &mut S::Tx) -> Result<()> {
        self.store.create_buckets(tx)
    }

    /// Rebuilds the in-memory state from the store: discovers every
    /// partition, and fully loads the one covering the current wall-clock
    /// time so the hot window is warm.
    pub fn restore(&self, tx: &S::Tx) -> Result<()> {
        let mut state = self.state.lock();
        state.all_partitions.clear();
        state.loaded.clear();

        let now = current_time_millis();
        for key in self.store.list_partitions(tx) {
            let meta = self.load_partition_meta(tx, key);
            info!(
                partition = %key,
                tenants = %meta.tenants().collect::<Vec<_>>().join(","),
                "restored index partition"
            );
            if meta.contains(now) {
                self.load_entire_partition(&mut state, tx, key);
            }
            state.all_partitions.push(meta);
        }
        info!(
            count = state.all_partitions.len(),
            loaded = state.loaded.len(),
            "restored index partitions"
        );

        state.all_partitions.sort_by_key(|meta| meta.key);
        Ok(())
    }

    /// Inserts one block and persists it through the transaction.
    ///
    /// Fails with [`StrataError::BlockExists`] if a block with the same id is
    /// already present under the same (shard, tenant), leaving both memory
    /// and store untouched. A persistence failure propagates; the in-memory
    /// state may then be ahead of the store and the caller is expected to
    /// abort the transaction and [`Index::restore`].
    pub fn insert_block(&self, tx: &mut S::Tx, block: &BlockMeta) -> Result<()> {
        let mut state = self.state.lock();
        if self
            .find_block_locked(&mut state, tx, block.shard, &block.tenant_id, &block.id)?
            .is_some()
        {
            return Err(StrataError::BlockExists);
        }
        self.insert_block_locked(&mut state, tx, block)?;
        let key = PartitionKey::for_block(&block.id, self.config.partition_duration)?;
        self.store.store_block(tx, key, block)
    }

    /// Inserts one block into memory only: no duplicate check, no
    /// persistence. Intended for replay paths that re-apply already-durable
    /// state.
    pub fn insert_block_unchecked(&self, tx: &S::Tx, block: &BlockMeta) -> Result<()> {
        let mut state = self.state.lock();
        self.insert_block_locked(&mut state, tx, block)
    }

    /// Retrieves a block by (shard, tenant, id), loading its partition if
    /// necessary. Returns `None` if the block cannot be found.
    pub fn find_block(
        &self,
        tx: &S::Tx,
        shard: u32,
        tenant: &str,
        block_id: &str,
    ) -> Result<Option<BlockMeta>> {
        let mut state = self.state.lock();
        self.find_block_locked(&mut state, tx, shard, tenant, block_id)
    }

    /// Retrieves every listed block that exists under the list's
    /// (shard, tenant), in unspecified order.
    pub fn find_blocks(&self, tx: &S::Tx, list: &BlockList) -> Result<Vec<BlockMeta>> {
        let mut state = self.state.lock();

        let mut keys = HashSet::new();
        let mut outstanding = HashSet::new();
        for id in &list.blocks {
            keys.insert(PartitionKey::for_block(id, self.config.partition_duration)?);
            outstanding.insert(id.clone());
        }

        let mut found = Vec::with_capacity(list.blocks.len());
        for key in keys {
            if !state.has_partition(key) {
                continue;
            }
            let entry = self.get_or_load_partition(&mut state, tx, key, &list.tenant);
            let Some(shard_blocks) = entry.shards.get(&list.shard) else {
                continue;
            };
            // Snapshot the outstanding set; hits are removed so later
            // partitions do not probe for them again.
            let pending: Vec<String> = outstanding.iter().cloned().collect();
            for id in pending {
                if let Some(block) = shard_blocks.blocks.get(&id) {
                    found.push(block.clone());
                    outstanding.remove(&id);
                }
            }
        }
        Ok(found)
    }

    /// Retrieves all blocks that might hold data for the given time range
    /// and tenants. Mixed blocks are returned as well; the caller filters
    /// their contents per tenant.
    ///
    /// Partitions are keyed by block *creation* time while the filter below
    /// applies to the *payload* interval, so the partition scan is widened by
    /// the lookaround period on both sides before the per-block predicate
    /// runs. Returned blocks are owned copies, insulated from later index
    /// mutation.
    pub fn find_blocks_in_range(
        &self,
        tx: &S::Tx,
        start: i64,
        end: i64,
        tenants: &[String],
    ) -> Vec<BlockMeta> {
        let mut state = self.state.lock();
        let lookaround = self.config.lookaround_millis();
        let window_start = start.saturating_sub(lookaround);
        let window_end = end.saturating_add(lookaround);

        // A tenant may only match once per partition, no matter how often it
        // is listed.
        let wanted: HashSet<&str> = tenants.iter().map(String::as_str).collect();

        let mut candidates: Vec<(PartitionKey, Vec<&str>)> = Vec::new();
        for meta in &state.all_partitions {
            if !meta.overlaps(window_start, window_end) {
                continue;
            }
            let matched: Vec<&str> = wanted
                .iter()
                .copied()
                .filter(|tenant| meta.has_tenant(tenant))
                .collect();
            if !matched.is_empty() {
                candidates.push((meta.key, matched));
            }
        }

        let mut blocks = Vec::new();
        for (key, matched) in candidates {
            // The mixed entry is collected once per partition below, even if
            // several requested tenants match it.
            for tenant in matched.iter().copied().filter(|tenant| !tenant.is_empty()) {
                let entry = self.get_or_load_partition(&mut state, tx, key, tenant);
                collect_overlapping_blocks(entry, start, end, &mut blocks);
            }
            let entry = self.get_or_load_partition(&mut state, tx, key, "");
            collect_overlapping_blocks(entry, start, end, &mut blocks);
        }
        blocks
    }

    /// Atomically swaps compaction source blocks for their replacements
    /// within the caller's transaction.
    ///
    /// Replacements may land in the same or a different partition. On a store
    /// error the transaction should be aborted; the next [`Index::restore`]
    /// reconciles the in-memory state.
    pub fn replace_blocks(&self, tx: &mut S::Tx, compacted: &CompactedBlocks) -> Result<()> {
        let mut state = self.state.lock();
        for block in &compacted.new_blocks {
            self.insert_block_locked(&mut state, tx, block)?;
            let key = PartitionKey::for_block(&block.id, self.config.partition_duration)?;
            self.store.store_block(tx, key, block)?;
        }
        self.delete_block_list_locked(&mut state, tx, &compacted.source_blocks)
    }

    /// Memory-only variant of [`Index::replace_blocks`] for replay paths.
    pub fn replace_blocks_unchecked(&self, tx: &S::Tx, compacted: &CompactedBlocks) -> Result<()> {
        let mut state = self.state.lock();
        for block in &compacted.new_blocks {
            self.insert_block_locked(&mut state, tx, block)?;
        }
        let source = &compacted.source_blocks;
        for id in &source.blocks {
            self.delete_block_locked(&mut state, source.shard, &source.tenant, id)?;
        }
        Ok(())
    }

    /// Every partition whose interval contains the block's creation time.
    pub fn find_partition_metas(&self, block_id: &str) -> Result<Vec<PartitionMeta>> {
        let state = self.state.lock();
        let ts = block_timestamp_millis(block_id)?;
        Ok(state
            .all_partitions
            .iter()
            .filter(|meta| meta.contains(ts))
            .cloned()
            .collect())
    }

    /// Runs `f` concurrently for every known partition, loaded or not.
    ///
    /// Callbacks execute while the index lock is held: they must not call
    /// back into the index, and must not retain references past their
    /// return. The first error cancels the remaining invocations and is
    /// returned; cancelling the token stops the fan-out between invocations
    /// with [`StrataError::Cancelled`].
    pub fn for_each_partition<F>(&self, token: &CancelToken, f: F) -> Result<()>
    where
        F: Fn(&PartitionMeta) -> Result<()> + Send + Sync,
    {
        let state = self.state.lock();
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        match concurrency::for_each_concurrent(&state.all_partitions, workers, token, f) {
            Err(err) => {
                error!(%err, "error during partition iteration");
                Err(err)
            }
            Ok(()) if token.is_cancelled() => Err(StrataError::Cancelled),
            Ok(()) => Ok(()),
        }
    }

    fn load_partition_meta(&self, tx: &S::Tx, key: PartitionKey) -> PartitionMeta {
        let mut meta = PartitionMeta::new(key);
        for shard in self.store.list_shards(tx, key) {
            for tenant in self.store.list_tenants(tx, key, shard) {
                meta.add_tenant(&tenant);
            }
        }
        meta
    }

    /// Loads every (partition, tenant) entry of one partition, bypassing the
    /// eviction pass: warming the hot window must not tear it down.
    fn load_entire_partition(&self, state: &mut State, tx: &S::Tx, key: PartitionKey) {
        for shard in self.store.list_shards(tx, key) {
            for tenant in self.store.list_tenants(tx, key, shard) {
                let cache_key = CacheKey::new(key, &tenant);
                let entry = state.loaded.get_or_insert(cache_key, key);
                let shard_blocks = entry.shards.entry(shard).or_default();
                for block in self.store.list_blocks(tx, key, shard, &tenant) {
                    shard_blocks.blocks.insert(block.id.clone(), block);
                }
            }
        }
    }

    /// Returns the cached entry for `(key, tenant)`, materializing it from
    /// the store on a miss: every shard of the partition is enumerated and
    /// the tenant's blocks mapped by id. The access stamp is refreshed before
    /// the eviction pass runs so the entry cannot evict itself.
    fn get_or_load_partition<'a>(
        &self,
        state: &'a mut State,
        tx: &S::Tx,
        key: PartitionKey,
        tenant: &str,
    ) -> &'a mut LoadedPartition {
        let cache_key = CacheKey::new(key, tenant);
        if !state.loaded.contains(&cache_key) {
            let mut entry = LoadedPartition::new(key);
            for shard in self.store.list_shards(tx, key) {
                let shard_blocks = entry.shards.entry(shard).or_default();
                for block in self.store.list_blocks(tx, key, shard, tenant) {
                    shard_blocks.blocks.insert(block.id.clone(), block);
                }
            }
            state.loaded.insert(cache_key.clone(), entry);
        }
        state.loaded.touch(&cache_key);
        state.loaded.evict_excess(&cache_key, current_time_millis());
        state.loaded.get_or_insert(cache_key, key)
    }

    fn find_block_locked(
        &self,
        state: &mut State,
        tx: &S::Tx,
        shard: u32,
        tenant: &str,
        block_id: &str,
    ) -> Result<Option<BlockMeta>> {
        let key = PartitionKey::for_block(block_id, self.config.partition_duration)?;

        // First try the partition the block maps to under the current
        // configuration.
        if let Some(block) = self.find_block_in_partition(state, tx, key, shard, tenant, block_id) {
            return Ok(Some(block));
        }

        // The partition duration may have changed between writer and reader
        // epochs; probe every partition that could contain the block.
        let ts = block_timestamp_millis(block_id)?;
        let candidates: Vec<PartitionKey> = state
            .all_partitions
            .iter()
            .filter(|meta| meta.key != key && meta.contains(ts))
            .map(|meta| meta.key)
            .collect();
        for candidate in candidates {
            if let Some(block) =
                self.find_block_in_partition(state, tx, candidate, shard, tenant, block_id)
            {
                return Ok(Some(block));
            }
        }
        Ok(None)
    }

    fn find_block_in_partition(
        &self,
        state: &mut State,
        tx: &S::Tx,
        key: PartitionKey,
        shard: u32,
        tenant: &str,
        block_id: &str,
    ) -> Option<BlockMeta> {
        if !state.has_partition(key) {
            return None;
        }
        let entry = self.get_or_load_partition(state, tx, key, tenant);
        entry
            .shards
            .get(&shard)
            .and_then(|shard_blocks| shard_blocks.blocks.get(block_id))
            .cloned()
    }

    /// Inserts into memory, creating the partition meta if needed. The
    /// caller persists separately if required.
    fn insert_block_locked(&self, state: &mut State, tx: &S::Tx, block: &BlockMeta) -> Result<()> {
        let key = self.get_or_create_partition_meta(state, block)?;
        let entry = self.get_or_load_partition(state, tx, key, &block.tenant_id);
        let shard_blocks = entry.shards.entry(block.shard).or_default();
        // Second idempotent check: replayed inserts must not clobber the
        // resident record.
        shard_blocks
            .blocks
            .entry(block.id.clone())
            .or_insert_with(|| block.clone());
        Ok(())
    }

    fn get_or_create_partition_meta(
        &self,
        state: &mut State,
        block: &BlockMeta,
    ) -> Result<PartitionKey> {
        let key = PartitionKey::for_block(&block.id, self.config.partition_duration)?;
        let idx = match state
            .all_partitions
            .binary_search_by_key(&key, |meta| meta.key)
        {
            Ok(idx) => idx,
            Err(idx) => {
                state.all_partitions.insert(idx, PartitionMeta::new(key));
                idx
            }
        };

        let meta = &mut state.all_partitions[idx];
        if block.is_mixed() {
            for dataset in &block.datasets {
                meta.add_tenant(&dataset.tenant_id);
            }
        } else {
            meta.add_tenant(&block.tenant_id);
        }
        Ok(key)
    }

    fn delete_block_list_locked(
        &self,
        state: &mut State,
        tx: &mut S::Tx,
        list: &BlockList,
    ) -> Result<()> {
        let mut groups: HashMap<PartitionKey, Vec<String>> = HashMap::new();
        for id in &list.blocks {
            let key = PartitionKey::for_block(id, self.config.partition_duration)?;
            groups.entry(key).or_default().push(id.clone());
        }

        for (key, blocks) in groups {
            let partitioned = BlockList {
                tenant: list.tenant.clone(),
                shard: list.shard,
                blocks,
            };
            self.store.delete_block_list(tx, key, &partitioned)?;

            // Mirror the deletion in the loaded entry, if any.
            let cache_key = CacheKey::new(key, &list.tenant);
            let Some(entry) = state.loaded.get_mut(&cache_key) else {
                continue;
            };
            let Some(shard_blocks) = entry.shards.get_mut(&partitioned.shard) else {
                continue;
            };
            for id in &partitioned.blocks {
                shard_blocks.blocks.remove(id);
            }
        }
        Ok(())
    }

    /// Memory-only deletion: probes the natural partition first, then every
    /// partition containing the block's creation time.
    fn delete_block_locked(
        &self,
        state: &mut State,
        shard: u32,
        tenant: &str,
        block_id: &str,
    ) -> Result<()> {
        let key = PartitionKey::for_block(block_id, self.config.partition_duration)?;
        if state.try_delete(key, shard, tenant, block_id) {
            return Ok(());
        }

        let ts = block_timestamp_millis(block_id)?;
        let candidates: Vec<PartitionKey> = state
            .all_partitions
            .iter()
            .filter(|meta| meta.key != key && meta.contains(ts))
            .map(|meta| meta.key)
            .collect();
        for candidate in candidates {
            if state.try_delete(candidate, shard, tenant, block_id) {
                return Ok(());
            }
        }
        Ok(())
    }
}

fn collect_overlapping_blocks(
    entry: &LoadedPartition,
    start: i64,
    end: i64,
    out: &mut Vec<BlockMeta>,
) {
    for shard_blocks in entry.shards.values() {
        for block in shard_blocks.blocks.values() {
            if start < block.max_time && end >= block.min_time {
                out.push(block.clone());
            }
        }
    }
}

fn current_time_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use ulid::Ulid;

    const HOUR_MILLIS: i64 = 3_600_000;

    fn hourly_index(cache_size: usize) -> Index<MemoryStore> {
        let config = Config::new()
            .with_partition_duration(Duration::from_secs(3600))
            .with_partition_cache_size(cache_size);
        Index::new(MemoryStore::new(), config).unwrap()
    }

    fn block_at(ts_millis: i64, seq: u128, shard: u32, tenant: &str) -> BlockMeta {
        BlockMeta {
            id: Ulid::from_parts(ts_millis as u64, seq).to_string(),
            shard,
            tenant_id: tenant.to_string(),
            min_time: ts_millis,
            max_time: ts_millis + 1_000,
            datasets: Vec::new(),
        }
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert!(Index::new(MemoryStore::new(), Config::new().with_partition_cache_size(0)).is_err());
        assert!(
            Index::new(
                MemoryStore::new(),
                Config::new().with_partition_duration(Duration::from_millis(10)),
            )
            .is_err()
        );
    }

    #[test]
    fn touching_partitions_beyond_budget_evicts_the_oldest() {
        let index = hourly_index(2);
        let mut tx = index.store().begin();

        // Three distinct historic partitions for one tenant.
        let base = 1_600_000 * 1_000;
        for hour in 0..3 {
            let block = block_at(base + hour * HOUR_MILLIS, hour as u128, 1, "tenant-a");
            index.insert_block(&mut tx, &block).unwrap();
            std::thread::sleep(Duration::from_millis(2));
        }

        let state = index.state.lock();
        assert_eq!(state.loaded.tenant_len("tenant-a"), 2);
        let oldest = CacheKey::new(
            PartitionKey {
                ts: base,
                duration: HOUR_MILLIS,
            },
            "tenant-a",
        );
        assert!(!state.loaded.contains(&oldest), "first partition evicted");
    }

    #[test]
    fn eviction_never_exceeds_budget_by_more_than_the_pinned_partition() {
        let index = hourly_index(2);
        let mut tx = index.store().begin();

        // One active partition plus three historic ones.
        let now = current_time_millis();
        index
            .insert_block(&mut tx, &block_at(now, 0, 1, "tenant-a"))
            .unwrap();
        let base = 1_600_000 * 1_000;
        for hour in 0..3 {
            let block = block_at(base + hour * HOUR_MILLIS, hour as u128 + 1, 1, "tenant-a");
            index.insert_block(&mut tx, &block).unwrap();
            std::thread::sleep(Duration::from_millis(2));
        }

        let state = index.state.lock();
        assert!(state.loaded.tenant_len("tenant-a") <= 3);
        let active = CacheKey::new(
            PartitionKey {
                ts: (now / HOUR_MILLIS) * HOUR_MILLIS,
                duration: HOUR_MILLIS,
            },
            "tenant-a",
        );
        assert!(state.loaded.contains(&active), "active partition is pinned");
    }

    #[test]
    fn restore_sorts_partitions_and_warms_the_active_one() {
        let store = MemoryStore::new();
        let mut tx = store.begin();
        {
            let index = Index::new(
                &store,
                Config::new().with_partition_duration(Duration::from_secs(3600)),
            )
            .unwrap();
            let now = current_time_millis();
            // Inserted newest-first to make restore do the ordering work.
            index
                .insert_block(&mut tx, &block_at(now, 0, 1, "tenant-a"))
                .unwrap();
            index
                .insert_block(&mut tx, &block_at(now - 5 * HOUR_MILLIS, 1, 1, "tenant-a"))
                .unwrap();
            index
                .insert_block(&mut tx, &block_at(now - 9 * HOUR_MILLIS, 2, 1, "tenant-b"))
                .unwrap();
        }
        store.commit(tx);

        let index = Index::new(
            &store,
            Config::new().with_partition_duration(Duration::from_secs(3600)),
        )
        .unwrap();
        let tx = store.begin();
        index.restore(&tx).unwrap();

        let state = index.state.lock();
        assert_eq!(state.all_partitions.len(), 3);
        let keys: Vec<PartitionKey> = state.all_partitions.iter().map(|m| m.key).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted, "partitions must be sorted by (ts, duration)");

        let now = current_time_millis();
        let active = CacheKey::new(
            PartitionKey {
                ts: (now / HOUR_MILLIS) * HOUR_MILLIS,
                duration: HOUR_MILLIS,
            },
            "tenant-a",
        );
        assert!(state.loaded.contains(&active), "hot window is warmed");
        assert_eq!(state.loaded.len(), 1, "historic partitions stay unloaded");
    }
}

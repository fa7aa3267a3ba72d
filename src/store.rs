//! Storage substrate contract and an in-memory reference implementation.
//!
//! The index never touches the persistence layer directly. It consumes the
//! narrow [`Store`] trait below against a transaction value owned by the
//! caller, who decides whether to commit or abort after the engine returns.

use crate::partition::PartitionKey;
use crate::{BlockList, BlockMeta, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Narrow contract the index consumes from its transactional substrate.
///
/// Enumeration methods are infallible reads; mutations surface substrate
/// errors, which the index propagates verbatim so the caller can abort the
/// transaction.
pub trait Store {
    /// Transaction handle. One transaction is active per engine call; the
    /// caller owns its lifecycle.
    type Tx;

    /// Initializes the underlying namespaces. Idempotent.
    fn create_buckets(&self, tx: &mut Self::Tx) -> Result<()>;

    /// Persists one block under `(key, block.shard, block.tenant_id)`.
    fn store_block(&self, tx: &mut Self::Tx, key: PartitionKey, block: &BlockMeta) -> Result<()>;

    /// Removes the listed block ids from `(key, list.shard, list.tenant)`.
    fn delete_block_list(
        &self,
        tx: &mut Self::Tx,
        key: PartitionKey,
        list: &BlockList,
    ) -> Result<()>;

    /// All partition keys ever written.
    fn list_partitions(&self, tx: &Self::Tx) -> Vec<PartitionKey>;

    /// Shards present in a partition.
    fn list_shards(&self, tx: &Self::Tx, key: PartitionKey) -> Vec<u32>;

    /// Tenants present under `(key, shard)`. The empty string holds mixed
    /// blocks.
    fn list_tenants(&self, tx: &Self::Tx, key: PartitionKey, shard: u32) -> Vec<String>;

    /// All block metadata under the leaf.
    fn list_blocks(
        &self,
        tx: &Self::Tx,
        key: PartitionKey,
        shard: u32,
        tenant: &str,
    ) -> Vec<BlockMeta>;
}

impl<S: Store + ?Sized> Store for &S {
    type Tx = S::Tx;

    fn create_buckets(&self, tx: &mut Self::Tx) -> Result<()> {
        (**self).create_buckets(tx)
    }

    fn store_block(&self, tx: &mut Self::Tx, key: PartitionKey, block: &BlockMeta) -> Result<()> {
        (**self).store_block(tx, key, block)
    }

    fn delete_block_list(
        &self,
        tx: &mut Self::Tx,
        key: PartitionKey,
        list: &BlockList,
    ) -> Result<()> {
        (**self).delete_block_list(tx, key, list)
    }

    fn list_partitions(&self, tx: &Self::Tx) -> Vec<PartitionKey> {
        (**self).list_partitions(tx)
    }

    fn list_shards(&self, tx: &Self::Tx, key: PartitionKey) -> Vec<u32> {
        (**self).list_shards(tx, key)
    }

    fn list_tenants(&self, tx: &Self::Tx, key: PartitionKey, shard: u32) -> Vec<String> {
        (**self).list_tenants(tx, key, shard)
    }

    fn list_blocks(
        &self,
        tx: &Self::Tx,
        key: PartitionKey,
        shard: u32,
        tenant: &str,
    ) -> Vec<BlockMeta> {
        (**self).list_blocks(tx, key, shard, tenant)
    }
}

type BlocksById = BTreeMap<String, BlockMeta>;
type TenantBlocks = BTreeMap<String, BlocksById>;
type ShardTenants = BTreeMap<u32, TenantBlocks>;
type PartitionTree = BTreeMap<PartitionKey, ShardTenants>;

/// Snapshot transaction over the in-memory tree.
///
/// Mutations apply to the snapshot only; [`MemoryStore::commit`] publishes
/// them. Dropping an uncommitted transaction aborts it.
#[derive(Debug, Clone, Default)]
pub struct MemoryTx {
    partitions: PartitionTree,
}

/// In-memory [`Store`] with snapshot transactions.
///
/// Backs the test suite and benches, and serves as the reference for the
/// transactional semantics the index assumes: single writer, all-or-nothing
/// publication, reads within a transaction see its own writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    committed: Mutex<PartitionTree>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a transaction by snapshotting the committed tree.
    pub fn begin(&self) -> MemoryTx {
        MemoryTx {
            partitions: self.committed.lock().clone(),
        }
    }

    /// Publishes a transaction, replacing the committed tree.
    pub fn commit(&self, tx: MemoryTx) {
        *self.committed.lock() = tx.partitions;
    }
}

impl Store for MemoryStore {
    type Tx = MemoryTx;

    fn create_buckets(&self, _tx: &mut MemoryTx) -> Result<()> {
        Ok(())
    }

    fn store_block(&self, tx: &mut MemoryTx, key: PartitionKey, block: &BlockMeta) -> Result<()> {
        tx.partitions
            .entry(key)
            .or_default()
            .entry(block.shard)
            .or_default()
            .entry(block.tenant_id.clone())
            .or_default()
            .insert(block.id.clone(), block.clone());
        Ok(())
    }

    fn delete_block_list(
        &self,
        tx: &mut MemoryTx,
        key: PartitionKey,
        list: &BlockList,
    ) -> Result<()> {
        let Some(shards) = tx.partitions.get_mut(&key) else {
            return Ok(());
        };
        let Some(tenants) = shards.get_mut(&list.shard) else {
            return Ok(());
        };
        if let Some(blocks) = tenants.get_mut(&list.tenant) {
            for id in &list.blocks {
                blocks.remove(id);
            }
            if blocks.is_empty() {
                tenants.remove(&list.tenant);
            }
        }
        // The partition node itself stays, like an emptied bucket would.
        if tenants.is_empty() {
            shards.remove(&list.shard);
        }
        Ok(())
    }

    fn list_partitions(&self, tx: &MemoryTx) -> Vec<PartitionKey> {
        tx.partitions.keys().copied().collect()
    }

    fn list_shards(&self, tx: &MemoryTx, key: PartitionKey) -> Vec<u32> {
        tx.partitions
            .get(&key)
            .map(|shards| shards.keys().copied().collect())
            .unwrap_or_default()
    }

    fn list_tenants(&self, tx: &MemoryTx, key: PartitionKey, shard: u32) -> Vec<String> {
        tx.partitions
            .get(&key)
            .and_then(|shards| shards.get(&shard))
            .map(|tenants| tenants.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn list_blocks(
        &self,
        tx: &MemoryTx,
        key: PartitionKey,
        shard: u32,
        tenant: &str,
    ) -> Vec<BlockMeta> {
        tx.partitions
            .get(&key)
            .and_then(|shards| shards.get(&shard))
            .and_then(|tenants| tenants.get(tenant))
            .map(|blocks| blocks.values().cloned().collect())
            .unwrap_or_default()
    }
}

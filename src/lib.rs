//! strata - a time-partitioned block-metadata index
//!
//! strata tracks the immutable metadata blocks produced by an ingest and
//! compaction pipeline. Blocks are grouped by (time partition, shard, tenant)
//! and served from a bounded in-memory cache layered over a transactional
//! key-value substrate supplied by the caller (see [`Store`]).

mod cache;
pub mod concurrency;
pub mod error;
pub mod index;
pub mod partition;
pub mod store;

pub use concurrency::CancelToken;
pub use error::{Result, StrataError};
pub use index::{Config, Index};
pub use partition::{PartitionKey, PartitionMeta};
pub use store::{MemoryStore, MemoryTx, Store};

use serde::{Deserialize, Serialize};

/// Metadata describing one immutable block of stored profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockMeta {
    /// ULID string; encodes the block creation time.
    pub id: String,
    /// Horizontal partitioning key, opaque to the index.
    pub shard: u32,
    /// Owning tenant. Empty for mixed blocks, whose tenants are listed in
    /// `datasets` instead.
    pub tenant_id: String,
    /// Inclusive lower bound of the payload timestamps, epoch milliseconds.
    pub min_time: i64,
    /// Exclusive upper bound of the payload timestamps, epoch milliseconds.
    pub max_time: i64,
    /// Per-dataset tenants of a mixed block; empty when `tenant_id` is set.
    #[serde(default)]
    pub datasets: Vec<Dataset>,
}

impl BlockMeta {
    /// Returns true if the block carries data for multiple tenants.
    pub fn is_mixed(&self) -> bool {
        self.tenant_id.is_empty()
    }
}

/// One tenant's slice of a mixed block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub tenant_id: String,
}

/// A list of block ids sharing one (shard, tenant) coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockList {
    pub tenant: String,
    pub shard: u32,
    pub blocks: Vec<String>,
}

/// Outcome of one compaction: replacement blocks plus the source list they
/// supersede.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactedBlocks {
    pub new_blocks: Vec<BlockMeta>,
    pub source_blocks: BlockList,
}

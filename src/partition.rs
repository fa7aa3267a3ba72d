//! Partition key codec and per-partition metadata.
//!
//! This module is the only place that depends on the block id format: block
//! ids are ULID strings whose leading 48 bits encode the creation time in
//! milliseconds. Partitions bucket blocks by that creation time.

use crate::error::{Result, StrataError};
use chrono::{DateTime, NaiveDate};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use ulid::Ulid;

const MILLIS_PER_SECOND: i64 = 1_000;
const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;

/// Extracts the creation timestamp embedded in a block id, in milliseconds
/// since the Unix epoch.
pub fn block_timestamp_millis(block_id: &str) -> Result<i64> {
    let id = Ulid::from_string(block_id).map_err(|_| StrataError::InvalidBlockId {
        id: block_id.to_string(),
    })?;
    Ok(id.timestamp_ms() as i64)
}

/// Identifies one time bucket of the index.
///
/// The textual form is stable and read by other systems:
/// `"20240923T16.1h"` names the one-hour period between
/// 2024-09-23T16:00:00.000Z and 2024-09-23T16:59:59.999Z. Ordering by
/// `(ts, duration)` is the canonical partition ordering and agrees with the
/// lexicographic order of the textual form when durations are held constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey {
    /// Inclusive lower bound of the partition, epoch milliseconds.
    pub ts: i64,
    /// Width of the partition in milliseconds; `ts + duration` is exclusive.
    pub duration: i64,
}

impl PartitionKey {
    /// Computes the partition a block maps to under the given duration,
    /// flooring the block's creation time to a multiple of the duration.
    pub fn for_block(block_id: &str, duration: Duration) -> Result<Self> {
        let duration = duration_millis(duration);
        let t = block_timestamp_millis(block_id)?;
        Ok(Self {
            ts: (t / duration) * duration,
            duration,
        })
    }

    /// Returns true if the instant falls inside the partition.
    pub fn contains(&self, ts_millis: i64) -> bool {
        ts_millis >= self.ts && ts_millis < self.ts + self.duration
    }

    /// Returns true if the partition intersects `[start, end)`.
    pub fn overlaps(&self, start: i64, end: i64) -> bool {
        self.ts < end && self.ts + self.duration > start
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Partition timestamps come from 48-bit ULID milliseconds or from
        // parsing the textual form, both well inside chrono's range.
        let dt = DateTime::from_timestamp_millis(self.ts).unwrap_or_default();
        write!(
            f,
            "{}.{}",
            dt.format("%Y%m%dT%H"),
            format_duration_millis(self.duration)
        )
    }
}

impl FromStr for PartitionKey {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || StrataError::InvalidPartitionKey { key: s.to_string() };
        let (stamp, duration) = s.split_once('.').ok_or_else(invalid)?;
        if !s.is_ascii() || stamp.len() != 11 || stamp.as_bytes()[8] != b'T' {
            return Err(invalid());
        }
        let date = NaiveDate::parse_from_str(&stamp[..8], "%Y%m%d").map_err(|_| invalid())?;
        let hour: u32 = stamp[9..].parse().map_err(|_| invalid())?;
        let dt = date.and_hms_opt(hour, 0, 0).ok_or_else(invalid)?;
        let duration = parse_duration_millis(duration).ok_or_else(invalid)?;
        Ok(Self {
            ts: dt.and_utc().timestamp_millis(),
            duration,
        })
    }
}

fn duration_millis(duration: Duration) -> i64 {
    (duration.as_millis() as i64).max(1)
}

fn format_duration_millis(millis: i64) -> String {
    if millis % MILLIS_PER_HOUR == 0 {
        format!("{}h", millis / MILLIS_PER_HOUR)
    } else if millis % MILLIS_PER_MINUTE == 0 {
        format!("{}m", millis / MILLIS_PER_MINUTE)
    } else {
        format!("{}s", millis / MILLIS_PER_SECOND)
    }
}

fn parse_duration_millis(s: &str) -> Option<i64> {
    if s.len() < 2 || !s.is_ascii() {
        return None;
    }
    let (value, unit) = s.split_at(s.len() - 1);
    let value: i64 = value.parse().ok()?;
    if value <= 0 {
        return None;
    }
    match unit {
        "h" => Some(value * MILLIS_PER_HOUR),
        "m" => Some(value * MILLIS_PER_MINUTE),
        "s" => Some(value * MILLIS_PER_SECOND),
        _ => None,
    }
}

/// Summary of one partition: its key and every tenant that has ever
/// contributed a block to it, including the per-dataset tenants of mixed
/// blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionMeta {
    pub key: PartitionKey,
    tenants: BTreeSet<String>,
}

impl PartitionMeta {
    /// Creates a meta with an empty tenant set.
    pub fn new(key: PartitionKey) -> Self {
        Self {
            key,
            tenants: BTreeSet::new(),
        }
    }

    /// Records a tenant. Inserting an already-known tenant is a no-op.
    pub fn add_tenant(&mut self, tenant: &str) {
        if !self.tenants.contains(tenant) {
            self.tenants.insert(tenant.to_string());
        }
    }

    pub fn has_tenant(&self, tenant: &str) -> bool {
        self.tenants.contains(tenant)
    }

    /// Tenants in sorted order.
    pub fn tenants(&self) -> impl Iterator<Item = &str> {
        self.tenants.iter().map(String::as_str)
    }

    /// Inclusive lower bound of the partition, epoch milliseconds.
    pub fn timestamp(&self) -> i64 {
        self.key.ts
    }

    /// Partition width in milliseconds.
    pub fn duration_millis(&self) -> i64 {
        self.key.duration
    }

    /// Returns true if the instant falls inside the partition.
    pub fn contains(&self, ts_millis: i64) -> bool {
        self.key.contains(ts_millis)
    }

    /// Returns true if the partition intersects `[start, end)`.
    pub fn overlaps(&self, start: i64, end: i64) -> bool {
        self.key.overlaps(start, end)
    }
}

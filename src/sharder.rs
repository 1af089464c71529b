//! Rendezvous (highest-random-weight) partition assignment.
//!
//! A [`RendezvousSharder`] deterministically maps an arbitrary hashable key
//! to an ordered list of alive partitions. Ranking compares a combined hash
//! per candidate, so removing one assignee reassigns only the keys that had
//! selected it; every other key keeps its assignment list and relative
//! order. That minimal-disruption property is what makes the sharder safe to
//! rebuild on every membership change.
//!
//! Assignment is precomputed per hash bucket (a power-of-two table), so
//! `shard` is a single hash plus a table lookup per key. `shard` returns
//! slot positions into the full shard-key list the sharder was built with,
//! not partition values, so callers can keep their own side tables indexed
//! the same way.

use crate::error::CompileError;
use std::cmp::Reverse;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const NUM_BUCKETS: usize = 512;

/// Hash `value` with the deterministic std hasher.
///
/// `DefaultHasher::new()` uses fixed keys, so the result is stable within
/// and across runs. Never swap this for `RandomState`.
pub(crate) fn hash_of<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Deterministic, weighted key→partitions assignment. Immutable once built;
/// rebuild it whenever cluster membership changes.
#[derive(Clone, Debug)]
pub struct RendezvousSharder {
    buckets: Vec<Vec<usize>>,
    slots: usize,
}

impl RendezvousSharder {
    /// Build a sharder over `all` shard keys, ranking only the `alive`
    /// subset.
    ///
    /// `replication_factor` is the assignment list length per key. With
    /// `excess` set, `shard` instead returns the full alive list ranked by
    /// assignee hash alone — a stable failover preference order that is
    /// identical for every key.
    ///
    /// # Errors
    ///
    /// Fails fast on an empty alive set, a zero replication factor, or an
    /// alive assignee missing from `all`.
    pub fn build<P: Hash + Eq>(
        all: &[P],
        alive: &[P],
        replication_factor: usize,
        excess: bool,
    ) -> Result<Self, CompileError> {
        if alive.is_empty() {
            return Err(CompileError::NoAlivePartitions);
        }
        if replication_factor == 0 {
            return Err(CompileError::InvalidReplication(replication_factor));
        }

        let mut slot_hashes = Vec::with_capacity(alive.len());
        for assignee in alive {
            let slot = all
                .iter()
                .position(|p| p == assignee)
                .ok_or(CompileError::UnknownAssignee)?;
            slot_hashes.push((slot, hash_of(assignee)));
        }

        let mut buckets = Vec::with_capacity(NUM_BUCKETS);
        for bucket in 0..NUM_BUCKETS as u64 {
            let mut ranked: Vec<(usize, u64)> = slot_hashes
                .iter()
                .map(|&(slot, assignee_hash)| {
                    let score = if excess {
                        assignee_hash
                    } else {
                        hash_of(&(bucket, assignee_hash))
                    };
                    (slot, score)
                })
                .collect();
            // ties broken by slot position for determinism
            ranked.sort_by_key(|&(slot, score)| (Reverse(score), slot));
            if !excess {
                ranked.truncate(replication_factor);
            }
            buckets.push(ranked.into_iter().map(|(slot, _)| slot).collect());
        }

        Ok(Self {
            buckets,
            slots: all.len(),
        })
    }

    /// The ordered slot positions responsible for `key`, most-preferred
    /// first.
    pub fn shard<K: Hash>(&self, key: &K) -> &[usize] {
        let h = hash_of(key) as usize;
        &self.buckets[h & (NUM_BUCKETS - 1)]
    }

    /// The number of shard keys this sharder was built over (the valid slot
    /// range of `shard` results).
    pub fn slot_count(&self) -> usize {
        self.slots
    }
}

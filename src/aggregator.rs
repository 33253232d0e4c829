//! # Sharded statistics table
//!
//! Many ingestion workers merge game results into one table keyed by FEN.
//! Keys are routed to one of `2^shard_bits` shards by hash and each shard
//! has its own mutex, so updates to different positions rarely contend
//! while updates to the same position are serialized and never lost.

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;

use crate::record::Outcome;

/// Default: 256 shards (2^8)
pub const DEFAULT_SHARD_BITS: u8 = 8;

/// Win/draw/loss counters for one position, from White's point of view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Statistics {
    pub wins: u64,
    pub draws: u64,
    pub losses: u64,
}

impl Statistics {
    pub fn new(wins: u64, draws: u64, losses: u64) -> Self {
        Self {
            wins,
            draws,
            losses,
        }
    }

    /// Counters holding exactly one game with `outcome`
    pub fn from_outcome(outcome: Outcome) -> Self {
        let mut stats = Self::default();
        stats.record(outcome);
        stats
    }

    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Win => self.wins += 1,
            Outcome::Draw => self.draws += 1,
            Outcome::Loss => self.losses += 1,
            Outcome::Unknown => {}
        }
    }

    pub fn total(&self) -> u64 {
        self.wins + self.draws + self.losses
    }

    /// Every game at this position ended the same way
    pub fn is_conclusive(&self) -> bool {
        let total = self.total();
        total > 0 && (total == self.wins || total == self.draws || total == self.losses)
    }

    pub fn add(&mut self, other: &Statistics) {
        self.wins += other.wins;
        self.draws += other.draws;
        self.losses += other.losses;
    }
}

/// Report order: draw rate ascending, then total, wins and draws descending,
/// then losses ascending.
impl Ord for Statistics {
    fn cmp(&self, other: &Self) -> Ordering {
        // draws_a / total_a vs draws_b / total_b, compared exactly
        let lhs = u128::from(self.draws) * u128::from(other.total());
        let rhs = u128::from(other.draws) * u128::from(self.total());

        lhs.cmp(&rhs)
            .then_with(|| other.total().cmp(&self.total()))
            .then_with(|| other.wins.cmp(&self.wins))
            .then_with(|| other.draws.cmp(&self.draws))
            .then_with(|| self.losses.cmp(&other.losses))
    }
}

impl PartialOrd for Statistics {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

type Shard = Mutex<HashMap<String, Statistics>>;

/// Concurrent map from FEN to [`Statistics`].
///
/// Entries are only ever inserted or incremented; nothing is removed while
/// the table is shared.
pub struct StatsTable {
    shards: Box<[Shard]>,
    shard_mask: usize,
    hasher: RandomState,
}

impl StatsTable {
    pub fn new() -> Self {
        Self::with_shard_bits(DEFAULT_SHARD_BITS)
    }

    pub fn with_shard_bits(shard_bits: u8) -> Self {
        let num_shards = 1usize << shard_bits.min(16);
        let shards = (0..num_shards)
            .map(|_| Mutex::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            shards,
            shard_mask: num_shards - 1,
            hasher: RandomState::new(),
        }
    }

    #[inline]
    fn shard(&self, key: &str) -> &Shard {
        let hash = self.hasher.hash_one(key) as usize;
        &self.shards[hash & self.shard_mask]
    }

    /// Locates `key` and mutates its counters in place, inserting a zeroed
    /// entry first when absent. Only the key's shard is locked.
    pub fn update<F>(&self, key: &str, f: F)
    where
        F: FnOnce(&mut Statistics),
    {
        let mut shard = self.shard(key).lock();
        match shard.get_mut(key) {
            Some(stats) => f(stats),
            None => {
                let mut stats = Statistics::default();
                f(&mut stats);
                shard.insert(key.to_owned(), stats);
            }
        }
    }

    /// Counts one game with `outcome` at `key`
    pub fn merge(&self, key: &str, outcome: Outcome) {
        self.update(key, |stats| stats.record(outcome));
    }

    pub fn get(&self, key: &str) -> Option<Statistics> {
        self.shard(key).lock().get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.lock().is_empty())
    }

    /// Consumes the table once all writers are done
    pub fn into_entries(self) -> Vec<(String, Statistics)> {
        let mut entries = Vec::with_capacity(self.len());
        for shard in self.shards.into_vec() {
            entries.extend(shard.into_inner());
        }
        entries
    }
}

impl Default for StatsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsTable")
            .field("shards", &self.shards.len())
            .field("entries", &self.len())
            .finish()
    }
}

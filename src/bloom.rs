//! Memory-bounded probabilistic "seen" set with exact false-positive
//! disambiguation.
//!
//! An owned bit array with a SHA-256-derived index per hash function,
//! computed over raw bytes rather than a formatted string to avoid
//! allocating per hash.

use lru::LruCache;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::path::Path;

const RECENT_CAPACITY: usize = 1000;

/// Fixed-geometry Bloom filter. `m` (bit_size) and `k` (hash_count) are
/// derived once from `capacity`/`error_rate` and never change for the
/// lifetime of the set; `load` refuses a stale on-disk file whose size
/// doesn't match this geometry.
pub struct Bloom {
    bits: Vec<u8>,
    bit_size: u64,
    hash_count: u32,
}

impl Bloom {
    #[must_use]
    pub fn new(capacity: u64, error_rate: f64) -> Self {
        let bit_size = optimal_bit_size(capacity, error_rate);
        let hash_count = optimal_hash_count(bit_size, capacity.max(1));
        let byte_len = usize::try_from(bit_size.div_ceil(8)).unwrap_or(usize::MAX);
        Self {
            bits: vec![0u8; byte_len],
            bit_size,
            hash_count,
        }
    }

    pub fn add(&mut self, item: &[u8]) {
        for i in 0..self.hash_count {
            let idx = self.index_for(item, i);
            self.bits[(idx / 8) as usize] |= 1 << (idx % 8);
        }
    }

    #[must_use]
    pub fn contains(&self, item: &[u8]) -> bool {
        (0..self.hash_count).all(|i| {
            let idx = self.index_for(item, i);
            self.bits[(idx / 8) as usize] & (1 << (idx % 8)) != 0
        })
    }

    fn index_for(&self, item: &[u8], seed: u32) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(item);
        hasher.update(seed.to_le_bytes());
        let digest = hasher.finalize();
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(buf) % self.bit_size.max(1)
    }

    /// Persist the raw bit array; size alone is the geometry fingerprint
    /// `load` checks against.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, &self.bits)
    }

    /// Loads the bit array from disk iff its length matches this instance's
    /// geometry. A mismatch (capacity or error-rate changed) is silently
    /// ignored — the filter starts fresh, which is always correctness
    /// preserving.
    pub fn load(&mut self, path: &Path) -> std::io::Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        let data = std::fs::read(path)?;
        if data.len() != self.bits.len() {
            return Ok(false);
        }
        self.bits = data;
        Ok(true)
    }
}

fn optimal_bit_size(n: u64, p: f64) -> u64 {
    let n = n.max(1) as f64;
    let m = -(n * p.ln()) / (std::f64::consts::LN_2.powi(2));
    m.ceil() as u64
}

fn optimal_hash_count(m: u64, n: u64) -> u32 {
    let k = (m as f64 / n.max(1) as f64) * std::f64::consts::LN_2;
    (k.ceil() as u32).max(1)
}

/// Bloom set plus the exact recent-hash LRU that disambiguates suspected
/// false positives.
pub struct SeenSet {
    bloom: Bloom,
    recent: LruCache<[u8; 32], ()>,
    false_positive_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SeenOutcome {
    /// Never seen before; now recorded.
    New,
    /// Present in the recent LRU window — a confirmed duplicate.
    ConfirmedDuplicate,
    /// Present in the Bloom filter but not in the LRU window — could be a
    /// real duplicate outside the window or a Bloom false positive. These
    /// are kept rather than dropped.
    SuspectedFalsePositive,
}

impl SeenSet {
    #[must_use]
    pub fn new(capacity: u64, error_rate: f64) -> Self {
        Self {
            bloom: Bloom::new(capacity, error_rate),
            recent: LruCache::new(NonZeroUsize::new(RECENT_CAPACITY).expect("nonzero")),
            false_positive_count: 0,
        }
    }

    /// Canonical hash of a record: stable key ordering, UTF-8 serialization,
    /// SHA-256 digest.
    #[must_use]
    pub fn canonical_hash(record: &serde_json::Value) -> [u8; 32] {
        let canonical = canonicalize(record);
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hasher.finalize().into()
    }

    /// Apply the full dedup policy to an already-hashed record and update
    /// internal state accordingly.
    pub fn check_and_record(&mut self, hash: [u8; 32]) -> SeenOutcome {
        if !self.bloom.contains(&hash) {
            self.bloom.add(&hash);
            self.recent.put(hash, ());
            return SeenOutcome::New;
        }
        if self.recent.contains(&hash) {
            self.recent.put(hash, ());
            return SeenOutcome::ConfirmedDuplicate;
        }
        self.recent.put(hash, ());
        self.false_positive_count += 1;
        SeenOutcome::SuspectedFalsePositive
    }

    #[must_use]
    pub fn false_positive_count(&self) -> u64 {
        self.false_positive_count
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        self.bloom.save(path)
    }

    pub fn load(&mut self, path: &Path) -> std::io::Result<bool> {
        self.bloom.load(path)
    }
}

/// Stable-key-order JSON serialization: `serde_json::Value::Object` is
/// backed by a `BTreeMap` by default unless the `preserve_order` feature is
/// enabled (it is not, here), so `to_string` already produces sorted keys.
fn canonicalize(value: &serde_json::Value) -> String {
    value.to_string()
}

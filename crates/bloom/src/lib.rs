//! # Bloom Filter
//!
//! A space-efficient probabilistic set used to skip SSTables during point
//! lookups.
//!
//! A bloom filter can say with certainty that a key is **not** in the set
//! (no false negatives), but may occasionally claim a key **is** present
//! when it isn't (false positives). The false-positive rate is a function
//! of the bits spent per key and the number of probes.
//!
//! ## Usage in SiltDB
//!
//! The flusher and the compactor build one filter per SSTable they
//! produce, feeding it every key they write. During a point lookup the
//! engine consults the filter before touching the table: a negative
//! answer skips the sparse-index search and the disk read entirely.
//! Filters live in memory only; a table reopened after a restart has no
//! filter and is always searched.
//!
//! ## Example
//!
//! ```rust
//! use bloom::BloomFilter;
//!
//! let mut filter = BloomFilter::with_capacity(1000, 0.01);
//! filter.insert(b"hello");
//! assert!(filter.may_contain(b"hello"));
//! ```

/// A bloom filter backed by a bit vector.
///
/// The key is hashed once; the 64-bit result is split into a start
/// position (low half) and an odd step (high half), and each probe walks
/// one step further through the bit vector. One hash per operation,
/// regardless of the probe count.
pub struct BloomFilter {
    bits: Vec<u8>,
    /// Number of addressable bits (not necessarily a multiple of 8).
    bit_count: u64,
    /// Probes per key.
    probes: u32,
}

impl BloomFilter {
    /// Creates a filter sized for `expected_items` keys at the given
    /// target `false_positive_rate`.
    ///
    /// # Panics
    ///
    /// Panics if `expected_items` is 0 or `false_positive_rate` is not in
    /// `(0, 1)`.
    pub fn with_capacity(expected_items: usize, false_positive_rate: f64) -> Self {
        assert!(expected_items > 0, "expected at least one key");
        assert!(
            false_positive_rate > 0.0 && false_positive_rate < 1.0,
            "false positive rate must lie strictly between 0 and 1"
        );

        // Work in bits-per-key: b = -ln(p) / ln(2)^2 bits buy a false
        // positive rate of p, and b * ln(2) probes use them best.
        let ln2 = std::f64::consts::LN_2;
        let bits_per_key = -false_positive_rate.ln() / (ln2 * ln2);
        let bit_count = (expected_items as f64 * bits_per_key).ceil().max(64.0) as u64;
        let probes = (bits_per_key * ln2).round().clamp(1.0, 30.0) as u32;

        Self {
            bits: vec![0u8; ((bit_count + 7) / 8) as usize],
            bit_count,
            probes,
        }
    }

    /// Adds a key to the set.
    pub fn insert(&mut self, key: &[u8]) {
        let (mut pos, step) = self.probe_start(key);
        for _ in 0..self.probes {
            self.bits[(pos / 8) as usize] |= 1 << (pos % 8);
            pos = (pos + step) % self.bit_count;
        }
    }

    /// Returns `true` if the key **might** be in the set, `false` if it is
    /// **definitely not**.
    #[must_use]
    pub fn may_contain(&self, key: &[u8]) -> bool {
        let (mut pos, step) = self.probe_start(key);
        for _ in 0..self.probes {
            if self.bits[(pos / 8) as usize] >> (pos % 8) & 1 == 0 {
                return false;
            }
            pos = (pos + step) % self.bit_count;
        }
        true
    }

    /// Number of addressable bits.
    #[must_use]
    pub fn bit_count(&self) -> u64 {
        self.bit_count
    }

    /// Probes per key.
    #[must_use]
    pub fn probes(&self) -> u32 {
        self.probes
    }

    /// First probe position and the (odd, so never degenerate) stride
    /// between probes, both derived from one hash of the key.
    fn probe_start(&self, key: &[u8]) -> (u64, u64) {
        let h = mix64(key);
        ((h & 0xffff_ffff) % self.bit_count, (h >> 32) | 1)
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("bit_count", &self.bit_count)
            .field("probes", &self.probes)
            .field("bytes", &self.bits.len())
            .finish()
    }
}

/// Hashes a byte string to 64 bits by folding 8-byte words through the
/// splitmix64 finalizer. The length seeds the state so that a key and
/// its zero-padded extension hash differently.
fn mix64(key: &[u8]) -> u64 {
    let mut h = key.len() as u64 ^ 0x9e37_79b9_7f4a_7c15;
    for chunk in key.chunks(8) {
        let mut word = [0u8; 8];
        word[..chunk.len()].copy_from_slice(chunk);
        h = h.wrapping_add(u64::from_le_bytes(word));
        h ^= h >> 30;
        h = h.wrapping_mul(0xbf58_476d_1ce4_e5b9);
        h ^= h >> 27;
        h = h.wrapping_mul(0x94d0_49bb_1331_11eb);
        h ^= h >> 31;
    }
    h
}

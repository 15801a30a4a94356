//! The id-keyed caches of the indexer.

use dashmap::DashMap;
use std::hash::{BuildHasherDefault, Hasher};

/// A concurrent map keyed by a proposal id.
pub(crate) type IdMap<V> = DashMap<u64, V, BuildHasherDefault<IdHasher>>;

/// Returns an empty [`IdMap`].
pub(crate) fn id_map<V>() -> IdMap<V> {
    DashMap::with_hasher(BuildHasherDefault::default())
}

/// Hashes a `u64` id by multiplying it with a Fibonacci constant.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct IdHasher(u64);

const FIBONACCI_MULTIPLIER: u64 = 0x9e37_79b9_7f4a_7c15;

impl Hasher for IdHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 = self.0.rotate_left(8) ^ u64::from(*byte);
        }
        self.0 = self.0.wrapping_mul(FIBONACCI_MULTIPLIER);
    }

    fn write_u64(&mut self, id: u64) {
        self.0 = id.wrapping_mul(FIBONACCI_MULTIPLIER);
    }
}

use alloy_primitives::Address;
use rollup_node_watcher::constants::{
    DEFAULT_BLOCKS_PER_BATCH, DEFAULT_REORG_REWIND_DEPTH, DEFAULT_RETRY_INTERVAL,
};
use std::time::Duration;

/// The default depth the indexer rewinds to when no cached proposal survives a reorg.
pub const DEFAULT_REORG_SAFETY_DEPTH: u64 = DEFAULT_REORG_REWIND_DEPTH;

/// The default multiplier of the ring buffer size bounding the caches.
pub const DEFAULT_BUFFER_SIZE_MULTIPLIER: u64 = 2;

/// The default initial interval between two attempts of a failed live indexing pass.
#[cfg(any(test, feature = "test-utils"))]
pub const DEFAULT_LIVE_RETRY_INTERVAL: Duration = Duration::from_millis(1);
/// The default initial interval between two attempts of a failed live indexing pass.
#[cfg(not(any(test, feature = "test-utils")))]
pub const DEFAULT_LIVE_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// The default maximum interval between two attempts of a failed live indexing pass.
#[cfg(any(test, feature = "test-utils"))]
pub const DEFAULT_LIVE_RETRY_MAX_INTERVAL: Duration = Duration::from_millis(10);
/// The default maximum interval between two attempts of a failed live indexing pass.
#[cfg(not(any(test, feature = "test-utils")))]
pub const DEFAULT_LIVE_RETRY_MAX_INTERVAL: Duration = Duration::from_secs(30);

/// The configuration of the [`StateIndexer`](crate::StateIndexer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexerConfig {
    /// The address of the inbox contract.
    pub inbox_address: Address,
    /// The maximum amount of blocks covered by a single log query.
    pub max_blocks_per_filter: u64,
    /// The depth rewound to on a reorg when no cached proposal is still canonical.
    pub reorg_safety_depth: u64,
    /// The caches hold up to `buffer_size_multiplier` times the ring buffer size of entries.
    pub buffer_size_multiplier: u64,
    /// The interval between two attempts of a failed iteration step.
    pub retry_interval: Duration,
    /// The initial interval between two attempts of a failed live indexing pass.
    pub live_retry_interval: Duration,
    /// The maximum interval between two attempts of a failed live indexing pass.
    pub live_retry_max_interval: Duration,
}

impl IndexerConfig {
    /// Returns the default configuration for the inbox at `inbox_address`.
    pub const fn new(inbox_address: Address) -> Self {
        Self {
            inbox_address,
            max_blocks_per_filter: DEFAULT_BLOCKS_PER_BATCH,
            reorg_safety_depth: DEFAULT_REORG_SAFETY_DEPTH,
            buffer_size_multiplier: DEFAULT_BUFFER_SIZE_MULTIPLIER,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            live_retry_interval: DEFAULT_LIVE_RETRY_INTERVAL,
            live_retry_max_interval: DEFAULT_LIVE_RETRY_MAX_INTERVAL,
        }
    }
}

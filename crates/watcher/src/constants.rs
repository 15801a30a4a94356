use std::time::Duration;

/// The default maximum amount of blocks read in a single batch.
pub const DEFAULT_BLOCKS_PER_BATCH: u64 = 1000;

/// The default depth the cursor is rewound by when it is reorged out of the chain.
pub const DEFAULT_REORG_REWIND_DEPTH: u64 = 64;

/// The default amount of confirmations required before a block is iterated.
pub const DEFAULT_CONFIRMATIONS: u64 = 0;

/// The default interval between two attempts of a failed iteration step.
#[cfg(any(test, feature = "test-utils"))]
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(1);
/// The default interval between two attempts of a failed iteration step.
#[cfg(not(any(test, feature = "test-utils")))]
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(12);

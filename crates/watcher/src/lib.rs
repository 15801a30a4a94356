//! Chain iterators for the rollup node inbox indexer.
//!
//! The [`BlockRangeIterator`] walks the L1 in batches of blocks and rewinds its cursor when it
//! gets reorged out of the chain. The [`EventIterator`] builds on it to yield the decoded inbox
//! events of a kind, checking the continuity of their ids.

mod block;
pub use block::{
    BlockBatchHandler, BlockRangeConfig, BlockRangeIterator, CursorUpdate, IterControl, Step,
};

pub mod constants;

mod error;
pub use error::{CanRetry, ChainIteratorError, FilterLogError};

mod event;
pub use event::{
    EventHandler, EventIterator, EventKind, EventSource, InboxEvent, LegacyBatchProposal,
    ProposedEvent, ProposedEventIterator, ProposedEvents, ProvedEventIterator, ProvedEvents,
};

mod metrics;
pub use metrics::ChainIteratorMetrics;

mod retry;
pub use retry::{Backoff, Retry};

#[cfg(any(test, feature = "test-utils"))]
/// Common test helpers
pub mod test_utils;

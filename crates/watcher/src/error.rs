use crate::EventSource;
use alloy_primitives::B256;
use rollup_node_l1::CodecError;
use rollup_node_providers::L1ProviderError;

/// A [`Result`] that uses [`ChainIteratorError`] as the error type.
pub(crate) type ChainIteratorResult<T> = Result<T, ChainIteratorError>;

/// An error that occurred while iterating the L1 chain.
#[derive(Debug, thiserror::Error)]
pub enum ChainIteratorError {
    /// An error with the L1 provider.
    #[error("l1 provider error: {0}")]
    L1Provider(#[from] L1ProviderError),
    /// The log could not be decoded into the expected event.
    #[error("failed to decode log: {0}")]
    LogDecoding(#[from] alloy_sol_types::Error),
    /// The event payload could not be decoded.
    #[error("failed to decode event payload: {0}")]
    Codec(#[from] CodecError),
    /// An error related to logs returned by the L1 provider.
    #[error(transparent)]
    Logs(#[from] FilterLogError),
    /// The block of an event is not known by the L1 provider anymore.
    #[error("unknown block {0} for event")]
    UnknownBlock(B256),
    /// The event handler failed.
    #[error("event handler error: {0}")]
    Handler(Box<dyn std::error::Error + Send + Sync>),
    /// Two consecutive events of a source do not have consecutive ids.
    #[error("non continuous {kind} events: expected id {expected}, got {got}")]
    NonContinuous {
        /// The source of the events.
        kind: EventSource,
        /// The expected id.
        expected: u64,
        /// The received id.
        got: u64,
    },
    /// The iterator configuration is invalid.
    #[error("invalid iterator configuration: {0}")]
    Config(&'static str),
    /// The iteration was cancelled.
    #[error("iteration cancelled")]
    Cancelled,
}

impl ChainIteratorError {
    /// Returns a [`ChainIteratorError::Handler`] wrapping the provided error.
    pub fn handler<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Handler(Box::new(error))
    }
}

/// An error that occurred when filtering logs.
#[derive(Debug, thiserror::Error)]
pub enum FilterLogError {
    /// The log is missing a block number.
    #[error("missing block number for log")]
    MissingBlockNumber,
    /// The log is missing a block hash.
    #[error("missing block hash for log")]
    MissingBlockHash,
    /// The log is missing its index in the block.
    #[error("missing log index for log")]
    MissingLogIndex,
}

/// A trait for errors that can indicate whether an operation can be retried.
pub trait CanRetry {
    /// Returns true if the implementer can be retried.
    fn can_retry(&self) -> bool;
}

impl CanRetry for ChainIteratorError {
    fn can_retry(&self) -> bool {
        !matches!(self, Self::NonContinuous { .. } | Self::Config(_) | Self::Cancelled)
    }
}

use rollup_node_providers::L1ProviderError;
use rollup_node_watcher::{CanRetry, ChainIteratorError};

/// The result type of the indexer.
pub(crate) type IndexerResult<T> = Result<T, IndexerError>;

/// An error occurring while indexing the inbox state.
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    /// An error occurred at the L1 provider.
    #[error("l1 provider error: {0}")]
    L1Provider(#[from] L1ProviderError),
    /// An error occurred while iterating the inbox events.
    #[error(transparent)]
    ChainIterator(#[from] ChainIteratorError),
    /// The proposal is not cached.
    #[error("proposal {0} not found")]
    ProposalNotFound(u64),
    /// No proposal is cached.
    #[error("no proposal indexed")]
    NoProposals,
    /// The indexer was already started.
    #[error("indexer already started")]
    AlreadyStarted,
    /// The indexer was not started.
    #[error("indexer not started")]
    NotStarted,
}

impl CanRetry for IndexerError {
    fn can_retry(&self) -> bool {
        match self {
            Self::L1Provider(_) => true,
            Self::ChainIterator(err) => err.can_retry(),
            Self::ProposalNotFound(_) |
            Self::NoProposals |
            Self::AlreadyStarted |
            Self::NotStarted => false,
        }
    }
}

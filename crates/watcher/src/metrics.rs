use metrics::Counter;
use metrics_derive::Metrics;

/// The metrics for the chain iterators.
#[derive(Metrics)]
#[metrics(scope = "chain_iterator")]
pub struct ChainIteratorMetrics {
    /// A counter on the processed block batches.
    pub batches: Counter,
    /// A counter on the cursor rewinds following a reorg.
    pub rewinds: Counter,
    /// A counter on the events passed to the handlers.
    pub events: Counter,
    /// A counter on the retried iteration steps.
    pub retries: Counter,
}

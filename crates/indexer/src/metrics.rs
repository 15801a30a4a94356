use metrics::{Counter, Gauge, Histogram};
use metrics_derive::Metrics;

/// The metrics for the [`super::StateIndexer`].
#[derive(Metrics, Clone)]
#[metrics(scope = "indexer")]
pub struct IndexerMetrics {
    /// The number of reorgs recovered from.
    pub reorgs: Counter,
    /// The amount of blocks rewound on a reorg.
    pub reorg_depth: Histogram,
    /// The number of cached proposals.
    pub cached_proposals: Gauge,
    /// The number of cached transition records.
    pub cached_transition_records: Gauge,
    /// The duration of a live indexing pass.
    pub live_pass_duration: Histogram,
}

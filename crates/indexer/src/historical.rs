//! The backfill of the caches from the L1 history.

use crate::{error::IndexerResult, IndexerInner};
use rollup_node_primitives::Header;
use rollup_node_providers::L1ChainProvider;
use rollup_node_watcher::ChainIteratorError;
use std::sync::Arc;

impl<P> IndexerInner<P>
where
    P: L1ChainProvider + Clone + 'static,
{
    /// Fetches the proposals emitted up to `head`, walking the chain backward in windows of
    /// `max_blocks_per_filter` blocks.
    ///
    /// The walk ends once the genesis window was processed, the ring buffer size worth of
    /// proposals is cached or the first proposal is cached. Both caches are cleared first, so a
    /// previous failed backfill leaves nothing behind.
    #[tracing::instrument(skip_all, target = "rollup::indexer", fields(head = head.number))]
    pub(crate) async fn fetch_historical_proposals(
        self: &Arc<Self>,
        head: &Header,
    ) -> IndexerResult<()> {
        self.clear();

        let buffer_size = self.buffer_size();
        let mut window_end = head.number;
        let mut genesis_processed = false;

        loop {
            if self.cancel.is_cancelled() {
                return Err(ChainIteratorError::Cancelled.into())
            }
            if genesis_processed {
                tracing::debug!(target: "rollup::indexer", "reached genesis");
                break
            }
            let cached = self.proposals.len() as u64;
            if buffer_size > 0 && cached >= buffer_size {
                tracing::debug!(target: "rollup::indexer", cached, "ring buffer worth of proposals cached");
                break
            }
            if self.proposals.contains_key(&0) {
                tracing::debug!(target: "rollup::indexer", "first proposal cached");
                break
            }

            let window_start = window_end.saturating_sub(self.config.max_blocks_per_filter);
            tracing::debug!(target: "rollup::indexer", start = window_start, end = window_end, cached, "fetching historical proposals");
            self.index_proposals(window_start, window_end).await?;

            genesis_processed = window_start == 0;
            window_end = window_start;
        }

        tracing::info!(target: "rollup::indexer", cached = self.proposals.len(), "fetched historical proposals");
        Ok(())
    }

    /// Fetches the transition records emitted from the block of the last finalized proposal up
    /// to `head`.
    #[tracing::instrument(skip_all, target = "rollup::indexer", fields(head = head.number))]
    pub(crate) async fn fetch_historical_transition_records(
        self: &Arc<Self>,
        head: &Header,
    ) -> IndexerResult<()> {
        let Some(last) = self.last_proposal() else {
            tracing::debug!(target: "rollup::indexer", "no proposal cached, skipping transition records");
            return Ok(())
        };

        let last_finalized_id = last.core_state.last_finalized_proposal_id;
        let finalized_height =
            self.proposals.get(&last_finalized_id).map(|proposal| proposal.block_info.number);
        let start = match finalized_height {
            Some(height) => height,
            None => {
                let lowest = self.proposals.iter().map(|entry| entry.block_info.number).min();
                lowest.unwrap_or(last.block_info.number)
            }
        };
        let start = start.min(head.number);

        tracing::debug!(target: "rollup::indexer", last_finalized_id, start, "fetching historical transition records");
        self.index_transition_records(start, head.number).await?;

        tracing::info!(target: "rollup::indexer", cached = self.transition_records.len(), "fetched historical transition records");
        Ok(())
    }
}

//! The cache updates applied for each inbox event.

use crate::IndexerInner;
use rollup_node_primitives::{ProposalPayload, ProvedEventPayload, TransitionPayload};
use rollup_node_providers::L1ChainProvider;
use rollup_node_watcher::{
    ChainIteratorError, EventHandler, InboxEvent, IterControl, ProposedEvent,
};

impl<P> IndexerInner<P> {
    /// Caches the proposal, then evicts the proposals and the transition records lagging behind
    /// it by more than the eviction threshold.
    pub(crate) fn on_proposed_event(&self, payload: ProposalPayload) {
        let id = payload.id();
        let last_finalized_id = payload.core_state.last_finalized_proposal_id;
        tracing::trace!(target: "rollup::indexer", id, block = %payload.block_info, "caching proposal");
        self.proposals.insert(id, payload);

        let threshold = self.eviction_threshold();
        self.proposals.retain(|cached_id, _| cached_id.saturating_add(threshold) >= id);
        self.transition_records
            .retain(|cached_id, _| cached_id.saturating_add(threshold) >= last_finalized_id);

        self.metrics.cached_proposals.set(self.proposals.len() as f64);
        self.metrics.cached_transition_records.set(self.transition_records.len() as f64);
    }

    /// Caches the transition record, replacing any record of the same proposal.
    pub(crate) fn on_proved_event(&self, payload: TransitionPayload) {
        tracing::trace!(target: "rollup::indexer", id = payload.proposal_id, block = %payload.block_info, "caching transition record");
        self.transition_records.insert(payload.proposal_id, payload);
        self.metrics.cached_transition_records.set(self.transition_records.len() as f64);
    }

    /// Empties the proposal and transition record caches.
    pub(crate) fn clear(&self) {
        self.proposals.clear();
        self.transition_records.clear();
        self.metrics.cached_proposals.set(0.0);
        self.metrics.cached_transition_records.set(0.0);
    }

    /// Removes the proposals and transition records observed above `height`. Returns the amount
    /// of evicted proposals and records.
    pub(crate) fn evict_above(&self, height: u64) -> (usize, usize) {
        let proposals = self.proposals.len();
        let records = self.transition_records.len();
        self.proposals.retain(|_, proposal| proposal.block_info.number <= height);
        self.transition_records.retain(|_, record| record.block_info.number <= height);

        let remaining_proposals = self.proposals.len();
        let remaining_records = self.transition_records.len();
        self.metrics.cached_proposals.set(remaining_proposals as f64);
        self.metrics.cached_transition_records.set(remaining_records as f64);

        (proposals - remaining_proposals, records - remaining_records)
    }
}

#[async_trait::async_trait]
impl<P: L1ChainProvider> EventHandler<ProposedEvent> for IndexerInner<P> {
    async fn on_event(
        &self,
        event: InboxEvent<ProposedEvent>,
    ) -> Result<IterControl, ChainIteratorError> {
        let InboxEvent { event, block_info } = event;
        match event {
            ProposedEvent::Legacy(batch) => {
                tracing::trace!(target: "rollup::indexer", batch_id = batch.batch_id, "skipping pre-fork batch proposal");
            }
            ProposedEvent::Proposed(payload) => {
                let timestamp = payload.proposal.timestamp;
                self.on_proposed_event(ProposalPayload::new(payload, block_info, timestamp));
            }
        }
        Ok(IterControl::Continue)
    }
}

#[async_trait::async_trait]
impl<P: L1ChainProvider> EventHandler<ProvedEventPayload> for IndexerInner<P> {
    async fn on_event(
        &self,
        event: InboxEvent<ProvedEventPayload>,
    ) -> Result<IterControl, ChainIteratorError> {
        let InboxEvent { event, block_info } = event;
        let header = self
            .provider
            .header_by_hash(block_info.hash)
            .await?
            .ok_or(ChainIteratorError::UnknownBlock(block_info.hash))?;
        self.on_proved_event(TransitionPayload::new(event, block_info, header.timestamp));
        Ok(IterControl::Continue)
    }
}

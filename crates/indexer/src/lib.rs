//! The state indexer of the rollup node.
//!
//! The [`StateIndexer`] caches the latest proposals and transition records of the inbox. On
//! [`StateIndexer::start`], it backfills its caches from the L1 history, then follows the new
//! heads of the L1 from a background task, recovering from the reorgs of the chain.

use alloy_primitives::BlockNumber;
use rollup_node_primitives::{
    BlockInfo, CoreState, Header, InboxConfig, ProposalPayload, TransitionPayload,
};
use rollup_node_providers::{InboxConfigProvider, L1ChainProvider};
use rollup_node_watcher::{
    BlockRangeConfig, ChainIteratorError, ProposedEventIterator, ProvedEventIterator, Step,
};
use std::{future::Future, sync::Arc};
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

mod cache;
use cache::{id_map, IdMap};

mod config;
pub use config::{
    IndexerConfig, DEFAULT_BUFFER_SIZE_MULTIPLIER, DEFAULT_LIVE_RETRY_INTERVAL,
    DEFAULT_LIVE_RETRY_MAX_INTERVAL, DEFAULT_REORG_SAFETY_DEPTH,
};

mod error;
use error::IndexerResult;
pub use error::IndexerError;

mod handler;
mod historical;
mod live;

mod metrics;
pub use metrics::IndexerMetrics;

/// The proposals and transition records required to submit the next proposal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposalsInput {
    /// The last proposal, followed by the proposal in the ring buffer slot the next proposal
    /// overwrites, if the ring buffer is full.
    pub proposals: Vec<ProposalPayload>,
    /// The transition records ready for finalization, in proposal id order.
    pub transitions: Vec<TransitionPayload>,
}

/// Indexes the proposals and transition records of the inbox.
///
/// The indexer is cheap to clone and its query surface can be used from any task.
#[derive(Debug, Clone)]
pub struct StateIndexer<P> {
    inner: Arc<IndexerInner<P>>,
}

/// The state shared between the [`StateIndexer`] handles and its live indexing task.
#[derive(Debug)]
struct IndexerInner<P> {
    provider: P,
    config: IndexerConfig,
    inbox_config: InboxConfig,
    proposals: IdMap<ProposalPayload>,
    transition_records: IdMap<TransitionPayload>,
    state: RwLock<IndexerState>,
    historical_fetch: watch::Sender<bool>,
    cancel: CancellationToken,
    metrics: IndexerMetrics,
}

/// The indexing progress, mutated by the backfill and the live indexing passes.
#[derive(Debug, Default)]
struct IndexerState {
    last_indexed_block: Option<Header>,
    historical_fetch_completed: bool,
}

impl<P> StateIndexer<P>
where
    P: L1ChainProvider + InboxConfigProvider + Clone + 'static,
{
    /// Returns a new [`StateIndexer`] for the configured inbox. Reads the inbox configuration.
    pub async fn new(provider: P, config: IndexerConfig) -> Result<Self, IndexerError> {
        let inbox_config = provider.inbox_config(config.inbox_address).await?;
        tracing::info!(
            target: "rollup::indexer",
            inbox = %config.inbox_address,
            ring_buffer_size = inbox_config.ring_buffer_size,
            grace_period = inbox_config.finalization_grace_period,
            max_finalization_count = inbox_config.max_finalization_count,
            "loaded inbox configuration"
        );

        let (historical_fetch, _) = watch::channel(false);
        Ok(Self {
            inner: Arc::new(IndexerInner {
                provider,
                config,
                inbox_config,
                proposals: id_map(),
                transition_records: id_map(),
                state: RwLock::new(IndexerState::default()),
                historical_fetch,
                cancel: CancellationToken::new(),
                metrics: IndexerMetrics::default(),
            }),
        })
    }

    /// Backfills the caches from the L1 history, then spawns the live indexing task.
    ///
    /// Returns once the historical fetch completed. A failure of the backfill is returned and
    /// leaves the indexer startable again.
    pub async fn start(&self) -> Result<(), IndexerError> {
        let inner = &self.inner;
        let mut state = inner.state.write().await;
        if state.historical_fetch_completed {
            return Err(IndexerError::AlreadyStarted)
        }

        let head = inner.cancellable(inner.provider.header_by_number(None)).await?;
        tracing::info!(target: "rollup::indexer", head = %BlockInfo::from(&head), "starting historical fetch");

        inner.fetch_historical_proposals(&head).await?;
        state.last_indexed_block = Some(head.clone());
        inner.fetch_historical_transition_records(&head).await?;

        state.historical_fetch_completed = true;
        drop(state);
        inner.historical_fetch.send_replace(true);
        tracing::info!(
            target: "rollup::indexer",
            proposals = inner.proposals.len(),
            transition_records = inner.transition_records.len(),
            "historical fetch completed"
        );

        tokio::spawn(live::run(inner.clone()));
        Ok(())
    }
}

impl<P> StateIndexer<P> {
    /// Returns the cached proposals, ordered by id.
    pub fn proposals(&self) -> Vec<ProposalPayload> {
        let mut proposals =
            self.inner.proposals.iter().map(|entry| entry.value().clone()).collect::<Vec<_>>();
        proposals.sort_unstable_by_key(ProposalPayload::id);
        proposals
    }

    /// Returns the cached transition records, ordered by proposal id.
    pub fn transition_records(&self) -> Vec<TransitionPayload> {
        let mut records = self
            .inner
            .transition_records
            .iter()
            .map(|entry| entry.value().clone())
            .collect::<Vec<_>>();
        records.sort_unstable_by_key(|record| record.proposal_id);
        records
    }

    /// Returns the cached proposal with the provided id.
    pub fn get_proposal_by_id(&self, id: u64) -> Result<ProposalPayload, IndexerError> {
        self.inner
            .proposals
            .get(&id)
            .map(|proposal| proposal.clone())
            .ok_or(IndexerError::ProposalNotFound(id))
    }

    /// Returns the cached transition record of the proposal with the provided id.
    pub fn get_transition_record_by_proposal_id(&self, id: u64) -> Option<TransitionPayload> {
        self.inner.transition_records.get(&id).map(|record| record.clone())
    }

    /// Returns the cached proposal with the highest id.
    pub fn get_last_proposal(&self) -> Option<ProposalPayload> {
        self.inner.last_proposal()
    }

    /// Returns the core state recorded with the last proposal.
    pub fn get_last_core_state(&self) -> Option<CoreState> {
        self.get_last_proposal().map(|proposal| proposal.core_state)
    }

    /// Returns the proposals and the finalizable transition records required to submit the next
    /// proposal, finalizing at most `max_finalization_count` transitions.
    pub async fn get_proposals_input(
        &self,
        max_finalization_count: u64,
    ) -> Result<ProposalsInput, IndexerError> {
        let inner = &self.inner;
        let state = inner.state.read().await;
        let now = state.last_indexed_block.as_ref().map_or(0, |header| header.timestamp);

        let last = inner.last_proposal().ok_or(IndexerError::NoProposals)?;
        let last_id = last.id();
        let buffer_size = inner.buffer_size();

        let mut proposals = vec![last.clone()];
        if buffer_size > 0 && last_id + 1 >= buffer_size {
            let slot_id = last_id + 1 - buffer_size;
            if slot_id != last_id {
                proposals.push(self.get_proposal_by_id(slot_id)?);
            }
        }

        let mut max_count = max_finalization_count;
        if inner.inbox_config.max_finalization_count > 0 {
            max_count = max_count.min(inner.inbox_config.max_finalization_count);
        }
        let grace_period = inner.inbox_config.finalization_grace_period;

        let mut transitions = Vec::new();
        let mut parent_hash = last.core_state.last_finalized_transition_hash;
        let first_id = last.core_state.last_finalized_proposal_id + 1;
        for id in (first_id..).take(max_count as usize) {
            let Some(record) = self.get_transition_record_by_proposal_id(id) else { break };
            if record.transition.parent_transition_hash != parent_hash {
                tracing::debug!(target: "rollup::indexer", id, "transition record does not extend the finalized chain");
                break
            }
            if !record.is_past_grace_period(grace_period, now) {
                tracing::trace!(target: "rollup::indexer", id, "transition record still in grace period");
                break
            }
            parent_hash = record.transition_record.transition_hash;
            transitions.push(record);
        }

        Ok(ProposalsInput { proposals, transitions })
    }

    /// Returns true once the historical fetch completed.
    pub async fn is_historical_fetch_completed(&self) -> bool {
        self.inner.state.read().await.historical_fetch_completed
    }

    /// Waits until the historical fetch completed.
    pub async fn wait_historical_fetch(&self) -> Result<(), IndexerError> {
        let mut completed = self.inner.historical_fetch.subscribe();
        tokio::select! {
            biased;
            _ = self.inner.cancel.cancelled() => Err(ChainIteratorError::Cancelled.into()),
            result = completed.wait_for(|completed| *completed) => {
                result.map(|_| ()).map_err(|_| ChainIteratorError::Cancelled.into())
            }
        }
    }

    /// Returns the last block indexed.
    pub async fn last_indexed_block(&self) -> Option<Header> {
        self.inner.state.read().await.last_indexed_block.clone()
    }

    /// Returns the size of the inbox ring buffer.
    pub fn buffer_size(&self) -> u64 {
        self.inner.buffer_size()
    }

    /// Returns the inbox configuration.
    pub fn inbox_config(&self) -> InboxConfig {
        self.inner.inbox_config
    }

    /// Returns the number of cached proposals.
    pub fn proposals_count(&self) -> usize {
        self.inner.proposals.len()
    }

    /// Stops the live indexing task and any pending backfill.
    pub fn stop(&self) {
        tracing::info!(target: "rollup::indexer", "stopping state indexer");
        self.inner.cancel.cancel();
    }
}

impl<P> IndexerInner<P> {
    const fn buffer_size(&self) -> u64 {
        self.inbox_config.ring_buffer_size
    }

    /// The amount of ids an entry can lag behind before it is evicted.
    const fn eviction_threshold(&self) -> u64 {
        self.buffer_size().saturating_mul(self.config.buffer_size_multiplier)
    }

    fn last_proposal(&self) -> Option<ProposalPayload> {
        self.proposals.iter().max_by_key(|entry| *entry.key()).map(|entry| entry.value().clone())
    }

    fn iterator_config(&self, start: BlockNumber, end: BlockNumber) -> BlockRangeConfig {
        BlockRangeConfig {
            max_blocks_per_batch: self.config.max_blocks_per_filter,
            confirmations: 0,
            reorg_rewind_depth: self.config.reorg_safety_depth,
            retry_interval: self.config.retry_interval,
            ..BlockRangeConfig::range(start, Some(end))
        }
    }

    /// Races the future against the cancellation of the indexer.
    async fn cancellable<T, E>(&self, fut: impl Future<Output = Result<T, E>>) -> IndexerResult<T>
    where
        IndexerError: From<E>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ChainIteratorError::Cancelled.into()),
            result = fut => Ok(result?),
        }
    }
}

impl<P> IndexerInner<P>
where
    P: L1ChainProvider + Clone + 'static,
{
    /// Runs a proposal event iterator over `[start, end]`, feeding the caches.
    async fn index_proposals(
        self: &Arc<Self>,
        start: BlockNumber,
        end: BlockNumber,
    ) -> Result<Step, ChainIteratorError> {
        ProposedEventIterator::new(
            self.provider.clone(),
            self.config.inbox_address,
            self.iterator_config(start, end),
            self.clone(),
            self.cancel.child_token(),
        )
        .await?
        .iterate()
        .await
    }

    /// Runs a proof event iterator over `[start, end]`, feeding the caches.
    async fn index_transition_records(
        self: &Arc<Self>,
        start: BlockNumber,
        end: BlockNumber,
    ) -> Result<Step, ChainIteratorError> {
        ProvedEventIterator::new(
            self.provider.clone(),
            self.config.inbox_address,
            self.iterator_config(start, end),
            self.clone(),
            self.cancel.child_token(),
        )
        .await?
        .iterate()
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256};
    use rollup_node_providers::test_utils::MockL1Provider;
    use rollup_node_watcher::test_utils::{proposed_payload, proved_payload, transition_hash};

    const INBOX: Address = Address::repeat_byte(0x11);

    fn inbox_config(ring_buffer_size: u64, finalization_grace_period: u64) -> InboxConfig {
        InboxConfig { ring_buffer_size, finalization_grace_period, max_finalization_count: 16 }
    }

    async fn indexer(config: InboxConfig) -> eyre::Result<StateIndexer<MockL1Provider>> {
        let provider = MockL1Provider::new(200).with_inbox_config(config);
        Ok(StateIndexer::new(provider, IndexerConfig::new(INBOX)).await?)
    }

    fn proposal(id: u64, last_finalized: u64) -> ProposalPayload {
        let block_info = BlockInfo::new(id, B256::with_last_byte(id as u8));
        ProposalPayload::new(proposed_payload(id, last_finalized), block_info, id)
    }

    fn record(id: u64, block_timestamp: u64) -> TransitionPayload {
        let block_info = BlockInfo::new(id, B256::with_last_byte(id as u8));
        TransitionPayload::new(proved_payload(id), block_info, block_timestamp)
    }

    async fn set_last_indexed(indexer: &StateIndexer<MockL1Provider>, timestamp: u64) {
        let mut header = indexer.inner.provider.head().await;
        header.inner.timestamp = timestamp;
        indexer.inner.state.write().await.last_indexed_block = Some(header);
    }

    #[tokio::test]
    async fn test_should_evict_proposals_beyond_twice_the_buffer() -> eyre::Result<()> {
        // Given
        let indexer = indexer(inbox_config(5, 0)).await?;

        // When
        for id in 0..10 {
            indexer.inner.on_proposed_event(proposal(id, 0));
        }

        // Then
        assert_eq!(indexer.proposals_count(), 10);

        // When
        indexer.inner.on_proposed_event(proposal(20, 0));

        // Then
        let ids = indexer.proposals().iter().map(ProposalPayload::id).collect::<Vec<_>>();
        assert_eq!(ids, vec![20]);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_bound_cached_proposals() -> eyre::Result<()> {
        // Given
        let indexer = indexer(inbox_config(4, 0)).await?;

        // When
        for id in 0..50 {
            indexer.inner.on_proposed_event(proposal(id, 0));
        }

        // Then
        let max_id = indexer.get_last_proposal().map(|p| p.id()).unwrap();
        assert_eq!(max_id, 49);
        for proposal in indexer.proposals() {
            assert!(max_id - proposal.id() <= 2 * indexer.buffer_size());
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_should_evict_finalized_transition_records() -> eyre::Result<()> {
        // Given
        let indexer = indexer(inbox_config(2, 0)).await?;
        for id in 1..=6 {
            indexer.inner.on_proved_event(record(id, 0));
        }

        // When
        indexer.inner.on_proposed_event(proposal(10, 6));

        // Then
        let ids = indexer.transition_records().iter().map(|r| r.proposal_id).collect::<Vec<_>>();
        assert_eq!(ids, vec![2, 3, 4, 5, 6]);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_overwrite_proposals() -> eyre::Result<()> {
        // Given
        let indexer = indexer(inbox_config(5, 0)).await?;
        indexer.inner.on_proposed_event(proposal(3, 0));
        let mut replayed = proposal(3, 1);
        replayed.block_info = BlockInfo::new(42, B256::with_last_byte(42));

        // When
        indexer.inner.on_proposed_event(replayed.clone());

        // Then
        assert_eq!(indexer.proposals_count(), 1);
        assert_eq!(indexer.get_proposal_by_id(3)?, replayed);
        assert_eq!(indexer.get_last_core_state(), Some(replayed.core_state));
        assert!(matches!(indexer.get_proposal_by_id(4), Err(IndexerError::ProposalNotFound(4))));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_build_proposals_input() -> eyre::Result<()> {
        // Given
        let indexer = indexer(inbox_config(5, 0)).await?;
        for id in 0..=6 {
            indexer.inner.on_proposed_event(proposal(id, 2));
        }
        indexer.inner.on_proved_event(record(3, 0));
        indexer.inner.on_proved_event(record(4, 0));
        let mut unchained = record(5, 0);
        unchained.transition.parent_transition_hash = B256::repeat_byte(0xff);
        indexer.inner.on_proved_event(unchained);
        indexer.inner.on_proved_event(record(6, 0));
        set_last_indexed(&indexer, 100).await;

        // When
        let input = indexer.get_proposals_input(16).await?;

        // Then
        let proposal_ids = input.proposals.iter().map(ProposalPayload::id).collect::<Vec<_>>();
        assert_eq!(proposal_ids, vec![6, 2]);
        let record_ids = input.transitions.iter().map(|r| r.proposal_id).collect::<Vec<_>>();
        assert_eq!(record_ids, vec![3, 4]);
        assert_eq!(input.transitions[1].transition_record.transition_hash, transition_hash(4));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_omit_ring_slot_before_buffer_is_full() -> eyre::Result<()> {
        // Given
        let indexer = indexer(inbox_config(10, 0)).await?;
        for id in 0..=3 {
            indexer.inner.on_proposed_event(proposal(id, 0));
        }

        // When
        let input = indexer.get_proposals_input(16).await?;

        // Then
        assert_eq!(input.proposals.len(), 1);
        assert_eq!(input.proposals[0].id(), 3);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_fail_on_missing_ring_slot_proposal() -> eyre::Result<()> {
        // Given
        let indexer = indexer(inbox_config(5, 0)).await?;
        indexer.inner.on_proposed_event(proposal(9, 0));

        // When
        let result = indexer.get_proposals_input(16).await;

        // Then
        assert!(matches!(result, Err(IndexerError::ProposalNotFound(5))));
        assert!(matches!(
            StateIndexer::new(MockL1Provider::new(1), IndexerConfig::new(INBOX))
                .await?
                .get_proposals_input(16)
                .await,
            Err(IndexerError::NoProposals)
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_hold_back_records_in_grace_period() -> eyre::Result<()> {
        // Given
        let indexer = indexer(inbox_config(100, 50)).await?;
        indexer.inner.on_proposed_event(proposal(1, 0));
        indexer.inner.on_proved_event(record(1, 10));
        indexer.inner.on_proved_event(record(2, 60));
        indexer.inner.on_proved_event(record(3, 20));
        set_last_indexed(&indexer, 100).await;

        // When
        let input = indexer.get_proposals_input(16).await?;

        // Then
        let record_ids = input.transitions.iter().map(|r| r.proposal_id).collect::<Vec<_>>();
        assert_eq!(record_ids, vec![1]);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_cap_finalized_records() -> eyre::Result<()> {
        // Given
        let indexer = indexer(inbox_config(100, 0)).await?;
        indexer.inner.on_proposed_event(proposal(30, 0));
        for id in 1..=20 {
            indexer.inner.on_proved_event(record(id, 0));
        }
        set_last_indexed(&indexer, 1).await;

        // When
        let requested = indexer.get_proposals_input(3).await?;
        let configured = indexer.get_proposals_input(100).await?;

        // Then
        assert_eq!(requested.transitions.len(), 3);
        assert_eq!(configured.transitions.len(), 16);

        Ok(())
    }
}

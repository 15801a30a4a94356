//! Iteration of the inbox events on top of the [`BlockRangeIterator`].

mod kind;
pub use kind::{
    EventKind, EventSource, LegacyBatchProposal, ProposedEvent, ProposedEvents, ProvedEvents,
};

use crate::{
    error::ChainIteratorResult, BlockBatchHandler, BlockRangeConfig, BlockRangeIterator,
    ChainIteratorError, ChainIteratorMetrics, CursorUpdate, FilterLogError, IterControl, Step,
};
use alloy_primitives::Address;
use alloy_rpc_types_eth::{Filter, Log};
use rollup_node_primitives::{BlockInfo, Header};
use rollup_node_providers::L1ChainProvider;
use std::{collections::HashMap, marker::PhantomData};
use tokio_util::sync::CancellationToken;

/// An iterator over the proposal events of the inbox.
pub type ProposedEventIterator<P, H> = EventIterator<P, ProposedEvents, H>;

/// An iterator over the proof events of the inbox.
pub type ProvedEventIterator<P, H> = EventIterator<P, ProvedEvents, H>;

/// An inbox event along with the block it was emitted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxEvent<E> {
    /// The decoded event.
    pub event: E,
    /// The block the event was emitted in.
    pub block_info: BlockInfo,
}

/// A handler for the events yielded by an [`EventIterator`].
#[async_trait::async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait EventHandler<E: Send + 'static>: Send + Sync {
    /// Handles the event. Returning [`IterControl::Stop`] ends the iteration.
    async fn on_event(&self, event: InboxEvent<E>) -> Result<IterControl, ChainIteratorError>;
}

/// Iterates the inbox events of kind `K`, in batches of blocks.
///
/// Each batch queries the logs of every source of the kind in order, skips the removed logs and
/// checks the ids of the events of a source are consecutive inside the batch. Batches share their
/// boundary block, so logs at or before the last delivered position of a source are skipped. A
/// rewind of the cursor moves that position back to the rewound block.
#[derive(Debug)]
pub struct EventIterator<P, K, H> {
    inner: BlockRangeIterator<P, EventBatchHandler<P, K, H>>,
}

impl<P, K, H> EventIterator<P, K, H>
where
    P: L1ChainProvider + Clone,
    K: EventKind,
    H: EventHandler<K::Event>,
{
    /// Returns a new [`EventIterator`] over the events emitted by the inbox at `inbox_address`.
    pub async fn new(
        provider: P,
        inbox_address: Address,
        config: BlockRangeConfig,
        handler: H,
        cancel: CancellationToken,
    ) -> ChainIteratorResult<Self> {
        let batch_handler = EventBatchHandler {
            provider: provider.clone(),
            inbox_address,
            handler,
            delivered: HashMap::new(),
            metrics: ChainIteratorMetrics::default(),
            _kind: PhantomData,
        };
        let inner = BlockRangeIterator::new(provider, config, batch_handler, cancel).await?;
        Ok(Self { inner })
    }

    /// Iterates the events until the destination is reached or the handler stops the iteration.
    pub async fn iterate(&mut self) -> ChainIteratorResult<Step> {
        self.inner.iterate().await
    }

    /// Returns the current cursor of the iterator.
    pub const fn cursor(&self) -> &Header {
        self.inner.cursor()
    }

    /// Returns a reference to the event handler.
    pub const fn handler(&self) -> &H {
        &self.inner.handler().handler
    }
}

/// The [`BlockBatchHandler`] of an [`EventIterator`].
#[derive(Debug)]
struct EventBatchHandler<P, K, H> {
    provider: P,
    inbox_address: Address,
    handler: H,
    /// The position of the last log delivered to the handler, per source.
    delivered: HashMap<EventSource, LogPosition>,
    metrics: ChainIteratorMetrics,
    _kind: PhantomData<fn() -> K>,
}

/// The position of a log in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct LogPosition {
    block_number: u64,
    log_index: u64,
}

impl<P, K, H> EventBatchHandler<P, K, H>
where
    P: L1ChainProvider,
    K: EventKind,
    H: EventHandler<K::Event>,
{
    /// Handles the logs of a single source. Returns [`IterControl::Stop`] if the handler stopped.
    async fn handle_logs(
        &mut self,
        source: EventSource,
        logs: Vec<Log>,
        cursor: &mut CursorUpdate,
    ) -> ChainIteratorResult<IterControl> {
        let mut last_id: Option<u64> = None;
        let delivered = self.delivered.get(&source).copied();

        for log in logs.into_iter().filter(|log| !log.removed) {
            let block_info = block_info(&log)?;
            let position = LogPosition {
                block_number: block_info.number,
                log_index: log.log_index.ok_or(FilterLogError::MissingLogIndex)?,
            };
            if delivered.is_some_and(|delivered| position <= delivered) {
                continue
            }

            let event = K::decode(source, &log)?;

            let id = K::sequence_id(&event);
            if let Some(last_id) = last_id {
                let expected = last_id + 1;
                if id != expected {
                    return Err(ChainIteratorError::NonContinuous {
                        kind: source,
                        expected,
                        got: id,
                    })
                }
            }
            last_id = Some(id);

            tracing::trace!(target: "rollup::watcher", %source, id, block = block_info.number, "handling inbox event");
            self.metrics.events.increment(1);

            let control = self.handler.on_event(InboxEvent { event, block_info }).await?;
            self.delivered.insert(source, position);
            if control == IterControl::Stop {
                tracing::debug!(target: "rollup::watcher", %source, id, "event handler stopped the iteration");
                return Ok(IterControl::Stop)
            }

            if cursor.header().map(|header| header.hash) != Some(block_info.hash) {
                let header = self
                    .provider
                    .header_by_hash(block_info.hash)
                    .await?
                    .ok_or(ChainIteratorError::UnknownBlock(block_info.hash))?;
                cursor.advance(header);
            }
        }

        Ok(IterControl::Continue)
    }
}

#[async_trait::async_trait]
impl<P, K, H> BlockBatchHandler for EventBatchHandler<P, K, H>
where
    P: L1ChainProvider,
    K: EventKind,
    H: EventHandler<K::Event>,
{
    async fn on_blocks(
        &mut self,
        start: &Header,
        end: &Header,
        cursor: &mut CursorUpdate,
    ) -> Result<IterControl, ChainIteratorError> {
        for source in K::SOURCES {
            let filter = Filter::new()
                .address(self.inbox_address)
                .event_signature(source.topic())
                .from_block(start.number)
                .to_block(end.number);
            let logs = self.provider.logs(&filter).await?;

            if self.handle_logs(*source, logs, cursor).await? == IterControl::Stop {
                return Ok(IterControl::Stop)
            }
        }

        Ok(IterControl::Continue)
    }

    fn on_rewind(&mut self, cursor: &Header) {
        let rewound = LogPosition { block_number: cursor.number, log_index: u64::MAX };
        for position in self.delivered.values_mut() {
            *position = (*position).min(rewound);
        }
    }
}

/// Returns the block info of a log.
fn block_info(log: &Log) -> Result<BlockInfo, FilterLogError> {
    let number = log.block_number.ok_or(FilterLogError::MissingBlockNumber)?;
    let hash = log.block_hash.ok_or(FilterLogError::MissingBlockHash)?;
    Ok(BlockInfo::new(number, hash))
}

//! Iteration of the L1 chain in batches of blocks.

use crate::{
    constants::{
        DEFAULT_BLOCKS_PER_BATCH, DEFAULT_CONFIRMATIONS, DEFAULT_REORG_REWIND_DEPTH,
        DEFAULT_RETRY_INTERVAL,
    },
    error::ChainIteratorResult,
    Backoff, CanRetry, ChainIteratorError, ChainIteratorMetrics, Retry,
};
use rollup_node_primitives::Header;
use rollup_node_providers::L1ChainProvider;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Controls whether an iteration continues after a batch or an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterControl {
    /// Continue the iteration.
    Continue,
    /// Stop the iteration.
    Stop,
}

/// The result of an iteration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The destination of the iteration was reached.
    Done,
    /// A batch was processed and the destination is not reached yet.
    Continue,
    /// The handler stopped the iteration.
    Ended,
}

/// The configuration of a [`BlockRangeIterator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRangeConfig {
    /// The maximum amount of blocks in a batch.
    pub max_blocks_per_batch: u64,
    /// The height of the initial cursor. Required.
    pub start_height: Option<u64>,
    /// The fixed destination of the iteration. Follows the chain head if `None`.
    pub end_height: Option<u64>,
    /// The amount of confirmations applied to the chain head destination.
    pub confirmations: u64,
    /// The depth the cursor is rewound by when it was reorged.
    pub reorg_rewind_depth: u64,
    /// The interval between two attempts of a failed step.
    pub retry_interval: Duration,
}

impl Default for BlockRangeConfig {
    fn default() -> Self {
        Self {
            max_blocks_per_batch: DEFAULT_BLOCKS_PER_BATCH,
            start_height: None,
            end_height: None,
            confirmations: DEFAULT_CONFIRMATIONS,
            reorg_rewind_depth: DEFAULT_REORG_REWIND_DEPTH,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl BlockRangeConfig {
    /// Returns a configuration iterating from `start` to `end`, other values being the defaults.
    pub fn range(start: u64, end: Option<u64>) -> Self {
        Self { start_height: Some(start), end_height: end, ..Default::default() }
    }
}

/// Allows a [`BlockBatchHandler`] to move the cursor of the iterator inside the current batch.
///
/// The update is applied once the handler returns, whatever its result. When the handler stops
/// the iteration, the next iteration resumes from the updated cursor.
#[derive(Debug, Default)]
pub struct CursorUpdate {
    header: Option<Header>,
}

impl CursorUpdate {
    /// Moves the cursor to the provided header.
    pub fn advance(&mut self, header: Header) {
        self.header = Some(header);
    }

    /// Returns the header the cursor will be moved to, if any.
    pub const fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }
}

/// A handler for the batches of a [`BlockRangeIterator`].
#[async_trait::async_trait]
pub trait BlockBatchHandler: Send {
    /// Handles the batch of blocks from `start` to `end` (both included).
    async fn on_blocks(
        &mut self,
        start: &Header,
        end: &Header,
        cursor: &mut CursorUpdate,
    ) -> Result<IterControl, ChainIteratorError>;

    /// Called once the cursor of the iterator was rewound to `cursor` after a reorg.
    fn on_rewind(&mut self, _cursor: &Header) {}
}

/// Iterates the L1 chain in batches of at most `max_blocks_per_batch` blocks, from a start height
/// up to a fixed end height or the chain head.
///
/// Before each batch, the iterator checks its cursor is still part of the canonical chain, and
/// rewinds by `reorg_rewind_depth` blocks otherwise. Failed steps are retried with a constant
/// backoff until the cancellation token fires.
#[derive(Debug)]
pub struct BlockRangeIterator<P, H> {
    /// The L1 provider.
    provider: P,
    /// The iterator configuration.
    config: BlockRangeConfig,
    /// The batch handler.
    handler: H,
    /// The last header processed by the iterator.
    cursor: Header,
    /// The cancellation token.
    cancel: CancellationToken,
    /// The retry policy for failing steps.
    retry: Retry,
    /// The metrics for the iterator.
    metrics: ChainIteratorMetrics,
}

impl<P, H> BlockRangeIterator<P, H>
where
    P: L1ChainProvider,
    H: BlockBatchHandler,
{
    /// Returns a new [`BlockRangeIterator`] with its cursor at the start height.
    pub async fn new(
        provider: P,
        config: BlockRangeConfig,
        handler: H,
        cancel: CancellationToken,
    ) -> ChainIteratorResult<Self> {
        let start_height =
            config.start_height.ok_or(ChainIteratorError::Config("missing start height"))?;
        if config.end_height.is_some_and(|end| start_height > end) {
            return Err(ChainIteratorError::Config("start height is above end height"))
        }
        if config.max_blocks_per_batch == 0 {
            return Err(ChainIteratorError::Config("zero blocks per batch"))
        }

        let cursor = provider.header_by_number(Some(start_height)).await?;
        if let Some(end) = config.end_height {
            provider.header_by_number(Some(end)).await?;
        }

        let retry = Retry::new(Backoff::Constant(config.retry_interval), cancel.clone());
        Ok(Self {
            provider,
            config,
            handler,
            cursor,
            cancel,
            retry,
            metrics: ChainIteratorMetrics::default(),
        })
    }

    /// Returns the current cursor of the iterator.
    pub const fn cursor(&self) -> &Header {
        &self.cursor
    }

    /// Returns a reference to the batch handler.
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// Iterates until the destination is reached or the handler stops the iteration. Returns
    /// [`Step::Done`] or [`Step::Ended`] respectively, and [`ChainIteratorError::Cancelled`] if
    /// the cancellation token fired.
    pub async fn iterate(&mut self) -> ChainIteratorResult<Step> {
        let cancel = self.cancel.clone();
        let mut attempt = 0;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ChainIteratorError::Cancelled),
                result = self.step() => result,
            };

            match result {
                Ok(Step::Continue) => {
                    self.retry.record_success(attempt);
                    attempt = 0;
                }
                Ok(step) => {
                    self.retry.record_success(attempt);
                    tracing::debug!(target: "rollup::watcher", ?step, cursor = self.cursor.number, "block range iteration finished");
                    return Ok(step)
                }
                Err(err) if err.can_retry() => {
                    attempt += 1;
                    self.metrics.retries.increment(1);
                    tracing::warn!(target: "rollup::watcher", ?err, attempt, cursor = self.cursor.number, "block range iteration step failed");
                    self.retry.wait(attempt).await?;
                }
                Err(err) => {
                    tracing::error!(target: "rollup::watcher", ?err, cursor = self.cursor.number, "block range iteration aborted");
                    return Err(err)
                }
            }
        }
    }

    /// Runs a single iteration step: checks the cursor, then hands the next batch to the handler.
    pub async fn step(&mut self) -> ChainIteratorResult<Step> {
        self.ensure_cursor_canonical().await?;

        let destination = match self.config.end_height {
            Some(end) => end,
            None => self.provider.block_number().await?.saturating_sub(self.config.confirmations),
        };
        if self.cursor.number >= destination {
            return Ok(Step::Done)
        }

        let end_height =
            self.cursor.number.saturating_add(self.config.max_blocks_per_batch).min(destination);
        let end = self.provider.header_by_number(Some(end_height)).await?;

        tracing::trace!(target: "rollup::watcher", start = self.cursor.number, end = end_height, destination, "handling block batch");

        let mut update = CursorUpdate::default();
        let control = self.handler.on_blocks(&self.cursor, &end, &mut update).await;
        if let Some(header) = update.header {
            self.cursor = header;
        }
        let control = control?;
        self.metrics.batches.increment(1);

        if control == IterControl::Stop {
            return Ok(Step::Ended)
        }

        self.cursor = end;
        Ok(if end_height >= destination { Step::Done } else { Step::Continue })
    }

    /// Rewinds the cursor by `reorg_rewind_depth` blocks if it is not part of the canonical chain
    /// anymore. The rewound height is clamped to the chain head.
    async fn ensure_cursor_canonical(&mut self) -> ChainIteratorResult<()> {
        if self.provider.header_by_hash(self.cursor.hash).await?.is_some() {
            return Ok(())
        }

        let head = self.provider.block_number().await?;
        let height = self.cursor.number.saturating_sub(self.config.reorg_rewind_depth).min(head);
        tracing::warn!(target: "rollup::watcher", reorged = self.cursor.number, rewind_to = height, "iterator cursor was reorged");

        self.cursor = self.provider.header_by_number(Some(height)).await?;
        self.handler.on_rewind(&self.cursor);
        self.metrics.rewinds.increment(1);

        Ok(())
    }
}

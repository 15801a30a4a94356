//! The live indexing of the new L1 heads.

use crate::{error::IndexerResult, IndexerError, IndexerInner};
use futures::StreamExt;
use rollup_node_primitives::{BlockInfo, Header};
use rollup_node_providers::{HeaderStream, L1ChainProvider, L1ProviderError};
use rollup_node_watcher::{Backoff, ChainIteratorError, Retry};
use std::{future::Future, ops::ControlFlow, sync::Arc, time::Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Indexes each new head of the L1 until the indexer is cancelled.
pub(crate) async fn run<P>(inner: Arc<IndexerInner<P>>)
where
    P: L1ChainProvider + Clone + 'static,
{
    let retry = inner.live_retry();
    let Ok(heads) = retry.run("subscribe_new_heads", || inner.subscribe_new_heads()).await else {
        return
    };
    let Ok(head) = retry
        .run("header_by_number", || async {
            Ok::<_, IndexerError>(inner.provider.header_by_number(None).await?)
        })
        .await
    else {
        return
    };

    let (head_tx, mut head_rx) = watch::channel(head);
    tokio::spawn(forward_heads(inner.clone(), heads, head_tx));
    tracing::info!(target: "rollup::indexer", "live indexing started");

    let (inner_ref, retry_ref) = (&inner, &retry);
    follow_heads(head_rx, &inner.cancel, move |head| async move {
        match retry_ref.run("live_index", || inner_ref.live_index(head.clone())).await {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) if inner_ref.cancel.is_cancelled() => ControlFlow::Break(()),
            Err(err) => {
                tracing::error!(target: "rollup::indexer", ?err, head = %BlockInfo::from(&head), "live indexing pass failed");
                ControlFlow::Continue(())
            }
        }
    })
    .await;

    tracing::info!(target: "rollup::indexer", "live indexing stopped");
}

/// Runs `pass` on the latest head of the channel, then waits for a newer one, until `pass` breaks,
/// the token is cancelled or the sender is dropped.
///
/// The heads sent while a pass runs coalesce into a single following pass on the latest of them.
async fn follow_heads<F, Fut>(
    mut heads: watch::Receiver<Header>,
    cancel: &CancellationToken,
    mut pass: F,
) where
    F: FnMut(Header) -> Fut,
    Fut: Future<Output = ControlFlow<()>>,
{
    loop {
        let head = heads.borrow_and_update().clone();
        if pass(head).await.is_break() {
            return
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            changed = heads.changed() => if changed.is_err() { return },
        }
    }
}

/// Forwards the new heads to the live indexing loop, resubscribing when the stream ends.
async fn forward_heads<P>(
    inner: Arc<IndexerInner<P>>,
    mut heads: HeaderStream,
    head_tx: watch::Sender<Header>,
) where
    P: L1ChainProvider + Clone + 'static,
{
    let retry = inner.live_retry();
    loop {
        tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => return,
            head = heads.next() => match head {
                Some(head) => {
                    tracing::trace!(target: "rollup::indexer", head = %BlockInfo::from(&head), "received new head");
                    head_tx.send_replace(head);
                }
                None => {
                    tracing::warn!(target: "rollup::indexer", "new heads subscription ended, resubscribing");
                    match retry.run("subscribe_new_heads", || inner.subscribe_new_heads()).await {
                        Ok(stream) => heads = stream,
                        Err(_) => return,
                    }
                }
            },
        }
    }
}

impl<P> IndexerInner<P>
where
    P: L1ChainProvider + Clone + 'static,
{
    fn live_retry(&self) -> Retry {
        let backoff = Backoff::Exponential {
            initial: self.config.live_retry_interval,
            max: self.config.live_retry_max_interval,
        };
        Retry::new(backoff, self.cancel.clone())
    }

    async fn subscribe_new_heads(&self) -> IndexerResult<HeaderStream> {
        Ok(self.provider.subscribe_new_heads().await?)
    }

    /// Indexes the events up to `new_head`, after recovering from a reorg of the last indexed
    /// block if needed.
    #[tracing::instrument(skip_all, target = "rollup::indexer", fields(head = new_head.number))]
    pub(crate) async fn live_index(self: &Arc<Self>, new_head: Header) -> IndexerResult<()> {
        let started = Instant::now();
        let mut state = self.state.write().await;
        let mut last_indexed = state.last_indexed_block.clone().ok_or(IndexerError::NotStarted)?;

        if self.is_reorged(&last_indexed).await? {
            last_indexed = self.recover_from_reorg(&last_indexed).await?;
            state.last_indexed_block = Some(last_indexed.clone());
        }

        if new_head.number <= last_indexed.number {
            tracing::trace!(target: "rollup::indexer", last_indexed = last_indexed.number, "head already indexed");
            return Ok(())
        }

        let start = last_indexed.number;
        tokio::try_join!(
            self.index_proposals(start, new_head.number),
            self.index_transition_records(start, new_head.number),
        )?;

        tracing::debug!(target: "rollup::indexer", start, end = new_head.number, proposals = self.proposals.len(), "indexed new blocks");
        state.last_indexed_block = Some(new_head);
        self.metrics.live_pass_duration.record(started.elapsed().as_secs_f64());

        Ok(())
    }

    /// Returns true if the last indexed block is no longer canonical.
    async fn is_reorged(&self, last_indexed: &Header) -> IndexerResult<bool> {
        match self.provider.header_by_number(Some(last_indexed.number)).await {
            Ok(header) => Ok(header.hash != last_indexed.hash),
            Err(L1ProviderError::MissingHeader(_)) => Ok(true),
            Err(err) => Err(err.into()),
        }
    }

    /// Rewinds the caches to the block of the last canonical proposal, or by the reorg safety
    /// depth if no cached proposal is canonical. Returns the header to index from.
    async fn recover_from_reorg(&self, last_indexed: &Header) -> IndexerResult<Header> {
        let safe_height = match self.last_canonical_proposal_block().await? {
            Some(block) => block.number,
            None => last_indexed.number.saturating_sub(self.config.reorg_safety_depth),
        };
        let safe_height = safe_height.min(self.provider.block_number().await?);
        let ancestor = self.provider.header_by_number(Some(safe_height)).await?;

        let (proposals, records) = self.evict_above(safe_height);
        let depth = last_indexed.number.saturating_sub(safe_height);
        self.metrics.reorgs.increment(1);
        self.metrics.reorg_depth.record(depth as f64);

        tracing::warn!(
            target: "rollup::indexer",
            last_indexed = %BlockInfo::from(last_indexed),
            safe_height,
            depth,
            evicted_proposals = proposals,
            evicted_transition_records = records,
            "recovered from L1 reorg"
        );
        Ok(ancestor)
    }

    /// Returns the block of the highest proposal whose block is still canonical.
    async fn last_canonical_proposal_block(&self) -> IndexerResult<Option<BlockInfo>> {
        let mut candidates = self
            .proposals
            .iter()
            .map(|entry| (*entry.key(), entry.block_info))
            .collect::<Vec<_>>();
        candidates.sort_unstable_by(|a, b| b.0.cmp(&a.0));

        for (id, block) in candidates {
            match self.provider.header_by_number(Some(block.number)).await {
                Ok(header) if header.hash == block.hash => {
                    tracing::debug!(target: "rollup::indexer", id, %block, "found last canonical proposal");
                    return Ok(Some(block))
                }
                Ok(_) | Err(L1ProviderError::MissingHeader(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }

        Ok(None)
    }
}

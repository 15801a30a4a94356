//! Test utils for providers.

use crate::{HeaderStream, InboxConfigProvider, L1ChainProvider, L1ProviderError};
use std::sync::Arc;

use alloy_consensus::Header as ConsensusHeader;
use alloy_eips::BlockNumberOrTag;
use alloy_primitives::{Address, LogData, B256};
use alloy_rpc_types_eth::{Filter, Header, Log};
use alloy_sol_types::SolEvent;
use futures::StreamExt;
use rollup_node_l1::{
    abi::logs::{Proposed, Proved},
    encode_proposed_event, encode_proved_event,
};
use rollup_node_primitives::{InboxConfig, ProposedEventPayload, ProvedEventPayload};
use tokio::sync::{broadcast, Mutex};
use tokio_stream::wrappers::BroadcastStream;

/// The block time of the mock chain.
pub const BLOCK_TIME: u64 = 12;

/// Returns a header at `number` on top of `parent_hash`. The `fork` value is mixed into the
/// header so that headers at the same height on different forks have different hashes.
pub fn mock_header(number: u64, parent_hash: B256, fork: u64) -> Header {
    Header::new(ConsensusHeader {
        number,
        parent_hash,
        timestamp: number * BLOCK_TIME,
        mix_hash: B256::left_padding_from(&fork.to_be_bytes()),
        ..Default::default()
    })
}

/// Returns the log data of a `Proposed` event carrying the payload.
pub fn proposed_log_data(payload: &ProposedEventPayload) -> LogData {
    Proposed { data: encode_proposed_event(payload).into() }.encode_log_data()
}

/// Returns the log data of a `Proved` event carrying the payload.
pub fn proved_log_data(payload: &ProvedEventPayload) -> LogData {
    Proved { data: encode_proved_event(payload).into() }.encode_log_data()
}

#[derive(Debug, Default)]
struct MockChain {
    /// The canonical headers, indexed by number.
    headers: Vec<Header>,
    /// The logs emitted on the canonical chain.
    logs: Vec<Log>,
    /// The logs waiting for their block to be mined.
    pending_logs: Vec<Log>,
    /// The count of forks applied to the chain.
    forks: u64,
    /// The count of upcoming log queries that should fail.
    log_failures: usize,
}

impl MockChain {
    fn extend(&mut self, count: u64) -> Vec<Header> {
        let mut new_headers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (number, parent_hash) =
                self.headers.last().map_or((0, B256::ZERO), |h| (h.number + 1, h.hash));
            let header = mock_header(number, parent_hash, self.forks);
            self.headers.push(header.clone());
            self.include_pending_logs(&header);
            new_headers.push(header);
        }
        new_headers
    }

    /// Moves the pending logs of the header's block to the chain.
    fn include_pending_logs(&mut self, header: &Header) {
        let (included, pending): (Vec<Log>, Vec<Log>) = std::mem::take(&mut self.pending_logs)
            .into_iter()
            .partition(|log| log.block_number == Some(header.number));
        self.pending_logs = pending;
        for log in included {
            self.push_log(Log { block_hash: Some(header.hash), ..log });
        }
    }

    fn push_log(&mut self, mut log: Log) {
        let number = log.block_number;
        log.log_index = Some(self.logs.iter().filter(|l| l.block_number == number).count() as u64);
        self.logs.push(log);
        self.logs.sort_by_key(|l| (l.block_number, l.log_index));
    }
}

/// A mock L1 chain implementing [`L1ChainProvider`] and [`InboxConfigProvider`].
///
/// The chain starts at the genesis block and can be extended or forked. Forking drops the
/// replaced headers and their logs: the replaced hashes are then unknown to the provider, which
/// is how reorgs are observed by the callers.
#[derive(Debug, Clone)]
pub struct MockL1Provider {
    chain: Arc<Mutex<MockChain>>,
    heads: broadcast::Sender<Header>,
    inbox_config: InboxConfig,
}

impl MockL1Provider {
    /// Returns a new [`MockL1Provider`] with a canonical chain of `len` blocks.
    pub fn new(len: u64) -> Self {
        assert!(len >= 1, "chain should at least contain the genesis block");

        let mut chain = MockChain::default();
        chain.extend(len);
        let (heads, _) = broadcast::channel(256);

        Self {
            chain: Arc::new(Mutex::new(chain)),
            heads,
            inbox_config: InboxConfig {
                ring_buffer_size: 100,
                finalization_grace_period: 0,
                max_finalization_count: 16,
            },
        }
    }

    /// Sets the inbox configuration returned by the provider.
    pub const fn with_inbox_config(mut self, inbox_config: InboxConfig) -> Self {
        self.inbox_config = inbox_config;
        self
    }

    /// Returns the head of the chain.
    pub async fn head(&self) -> Header {
        self.chain.lock().await.headers.last().cloned().expect("chain is never empty")
    }

    /// Returns the canonical header at the provided height.
    pub async fn header(&self, number: u64) -> Option<Header> {
        self.chain.lock().await.headers.get(number as usize).cloned()
    }

    /// Extends the chain by `count` blocks, notifying each new head. Returns the new head.
    pub async fn mine(&self, count: u64) -> Header {
        let new_headers = self.chain.lock().await.extend(count);
        for header in new_headers {
            let _ = self.heads.send(header);
        }
        self.head().await
    }

    /// Replaces all the blocks from height `from` with a fork of `len` blocks. The logs of the
    /// replaced blocks are dropped and the new head is notified. Returns the new head.
    pub async fn reorg(&self, from: u64, len: u64) -> Header {
        let head = {
            let mut chain = self.chain.lock().await;
            assert!(from >= 1, "cannot reorg the genesis block");
            chain.headers.truncate(from as usize);
            chain.logs.retain(|log| log.block_number.is_some_and(|n| n < from));
            chain.forks += 1;
            chain.extend(len);
            chain.headers.last().cloned().expect("chain is never empty")
        };
        let _ = self.heads.send(head.clone());
        head
    }

    /// Pushes a log emitted by `address` in the canonical block at height `number`. A log pushed
    /// above the head is included once its block is mined.
    pub async fn push_log(&self, number: u64, address: Address, data: LogData) {
        self.push_log_inner(number, address, data, false).await
    }

    /// Pushes a log flagged as removed in the canonical block at height `number`.
    pub async fn push_removed_log(&self, number: u64, address: Address, data: LogData) {
        self.push_log_inner(number, address, data, true).await
    }

    /// Pushes a `Proposed` event emitted by the inbox at height `number`.
    pub async fn push_proposed(&self, number: u64, inbox: Address, payload: &ProposedEventPayload) {
        self.push_log(number, inbox, proposed_log_data(payload)).await
    }

    /// Pushes a `Proved` event emitted by the inbox at height `number`.
    pub async fn push_proved(&self, number: u64, inbox: Address, payload: &ProvedEventPayload) {
        self.push_log(number, inbox, proved_log_data(payload)).await
    }

    /// Makes the next `count` log queries fail.
    pub async fn fail_next_log_queries(&self, count: usize) {
        self.chain.lock().await.log_failures = count;
    }

    async fn push_log_inner(&self, number: u64, address: Address, data: LogData, removed: bool) {
        let mut chain = self.chain.lock().await;
        let log = Log {
            inner: alloy_primitives::Log { address, data },
            block_number: Some(number),
            block_timestamp: Some(number * BLOCK_TIME),
            removed,
            ..Default::default()
        };

        match chain.headers.get(number as usize).map(|header| header.hash) {
            Some(hash) => chain.push_log(Log { block_hash: Some(hash), ..log }),
            None => chain.pending_logs.push(log),
        }
    }
}

#[async_trait::async_trait]
impl L1ChainProvider for MockL1Provider {
    async fn header_by_number(&self, number: Option<u64>) -> Result<Header, L1ProviderError> {
        let Some(number) = number else { return Ok(self.head().await) };
        self.header(number)
            .await
            .ok_or(L1ProviderError::MissingHeader(BlockNumberOrTag::Number(number)))
    }

    async fn header_by_hash(&self, hash: B256) -> Result<Option<Header>, L1ProviderError> {
        Ok(self.chain.lock().await.headers.iter().find(|h| h.hash == hash).cloned())
    }

    async fn block_number(&self) -> Result<u64, L1ProviderError> {
        Ok(self.head().await.number)
    }

    async fn subscribe_new_heads(&self) -> Result<HeaderStream, L1ProviderError> {
        let stream = BroadcastStream::new(self.heads.subscribe())
            .filter_map(|header| futures::future::ready(header.ok()));
        Ok(stream.boxed())
    }

    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>, L1ProviderError> {
        let mut chain = self.chain.lock().await;
        if chain.log_failures > 0 {
            chain.log_failures -= 1;
            return Err(L1ProviderError::Other("injected log query failure"));
        }

        let from = filter.get_from_block().unwrap_or_default();
        let to = filter.get_to_block().unwrap_or(u64::MAX);
        let topic = &filter.topics[0];

        Ok(chain
            .logs
            .iter()
            .filter(|log| log.block_number.is_some_and(|n| (from..=to).contains(&n)))
            .filter(|log| filter.address.matches(&log.address()))
            .filter(|log| log.topics().first().map_or(topic.is_empty(), |t| topic.matches(t)))
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl InboxConfigProvider for MockL1Provider {
    async fn inbox_config(&self, _address: Address) -> Result<InboxConfig, L1ProviderError> {
        Ok(self.inbox_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_should_forget_reorged_hashes() -> eyre::Result<()> {
        // Given
        let provider = MockL1Provider::new(10);
        let old = provider.header(7).await.unwrap();
        let inbox = Address::with_last_byte(1);
        provider.push_proposed(8, inbox, &ProposedEventPayload::default()).await;

        // When
        let head = provider.reorg(5, 6).await;

        // Then
        assert_eq!(head.number, 10);
        assert!(provider.header_by_hash(old.hash).await?.is_none());
        assert_ne!(provider.header(7).await.unwrap().hash, old.hash);
        let filter = Filter::new().address(inbox).from_block(0).to_block(10);
        assert!(provider.logs(&filter).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_should_filter_logs_by_topic_and_range() -> eyre::Result<()> {
        // Given
        let provider = MockL1Provider::new(10);
        let inbox = Address::with_last_byte(1);
        provider.push_proposed(2, inbox, &ProposedEventPayload::default()).await;
        provider.push_proved(3, inbox, &ProvedEventPayload::default()).await;
        provider.push_proposed(6, inbox, &ProposedEventPayload::default()).await;

        // When
        let filter = Filter::new()
            .address(inbox)
            .event_signature(Proposed::SIGNATURE_HASH)
            .from_block(0)
            .to_block(5);
        let logs = provider.logs(&filter).await?;

        // Then
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].block_number, Some(2));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_include_pending_logs_once_mined() -> eyre::Result<()> {
        // Given
        let provider = MockL1Provider::new(5);
        let inbox = Address::with_last_byte(1);
        provider.push_proposed(7, inbox, &ProposedEventPayload::default()).await;
        let filter = Filter::new().address(inbox).from_block(0).to_block(10);
        assert!(provider.logs(&filter).await?.is_empty());

        // When
        let head = provider.mine(5).await;

        // Then
        let logs = provider.logs(&filter).await?;
        assert_eq!(head.number, 9);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].block_hash, provider.header(7).await.map(|h| h.hash));

        Ok(())
    }
}

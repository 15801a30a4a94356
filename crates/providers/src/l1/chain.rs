use crate::L1ProviderError;

use alloy_eips::BlockNumberOrTag;
use alloy_primitives::B256;
use alloy_provider::Provider;
use alloy_rpc_types_eth::{Filter, Header, Log};
use futures::{stream::BoxStream, StreamExt};

/// A stream of new L1 heads.
pub type HeaderStream = BoxStream<'static, Header>;

/// Provides access to the L1 chain: headers, logs and new heads notifications.
#[async_trait::async_trait]
pub trait L1ChainProvider: Send + Sync {
    /// Returns the header at the provided height, or the latest header if `None`.
    async fn header_by_number(&self, number: Option<u64>) -> Result<Header, L1ProviderError>;

    /// Returns the header for the provided hash. Returns `None` if the hash is not part of the
    /// canonical chain known by the node.
    async fn header_by_hash(&self, hash: B256) -> Result<Option<Header>, L1ProviderError>;

    /// Returns the latest block number.
    async fn block_number(&self) -> Result<u64, L1ProviderError>;

    /// Subscribes to new heads.
    async fn subscribe_new_heads(&self) -> Result<HeaderStream, L1ProviderError>;

    /// Returns the logs matching the filter.
    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>, L1ProviderError>;
}

#[async_trait::async_trait]
impl<P: Provider> L1ChainProvider for P {
    async fn header_by_number(&self, number: Option<u64>) -> Result<Header, L1ProviderError> {
        let tag = number.map_or(BlockNumberOrTag::Latest, BlockNumberOrTag::Number);
        let block = self.get_block_by_number(tag).await?;
        block.map(|block| block.header).ok_or(L1ProviderError::MissingHeader(tag))
    }

    async fn header_by_hash(&self, hash: B256) -> Result<Option<Header>, L1ProviderError> {
        Ok(self.get_block_by_hash(hash).await?.map(|block| block.header))
    }

    async fn block_number(&self) -> Result<u64, L1ProviderError> {
        Ok(self.get_block_number().await?)
    }

    async fn subscribe_new_heads(&self) -> Result<HeaderStream, L1ProviderError> {
        let subscription = self.subscribe_blocks().await?;
        Ok(subscription.into_stream().boxed())
    }

    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>, L1ProviderError> {
        Ok(self.get_logs(filter).await?)
    }
}

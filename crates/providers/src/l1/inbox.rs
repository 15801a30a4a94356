use crate::L1ProviderError;

use alloy_primitives::Address;
use alloy_provider::Provider;
use alloy_rpc_types_eth::{TransactionInput, TransactionRequest};
use alloy_sol_types::SolCall;
use rollup_node_l1::abi::calls::getConfigCall;
use rollup_node_primitives::InboxConfig;

/// Provides access to the inbox contract configuration.
#[async_trait::async_trait]
pub trait InboxConfigProvider: Send + Sync {
    /// Returns the configuration of the inbox deployed at the provided address.
    async fn inbox_config(&self, address: Address) -> Result<InboxConfig, L1ProviderError>;
}

#[async_trait::async_trait]
impl<P: Provider> InboxConfigProvider for P {
    async fn inbox_config(&self, address: Address) -> Result<InboxConfig, L1ProviderError> {
        let input = TransactionInput::new(getConfigCall {}.abi_encode().into());
        let request = TransactionRequest::default().to(address).input(input);

        let output = self.call(request).await?;
        let config: InboxConfig = getConfigCall::abi_decode_returns(&output)?.into();
        tracing::debug!(target: "rollup::providers", %address, ?config, "fetched inbox config");

        Ok(config)
    }
}

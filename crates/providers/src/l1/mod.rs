pub(crate) mod chain;
pub(crate) mod inbox;

use alloy_eips::BlockNumberOrTag;
use alloy_transport::{RpcError, TransportErrorKind};

/// An error occurring at the L1 providers.
#[derive(Debug, thiserror::Error)]
pub enum L1ProviderError {
    /// L1 RPC error.
    #[error(transparent)]
    Rpc(#[from] RpcError<TransportErrorKind>),
    /// The requested header is not known by the L1 node.
    #[error("missing header for block {0}")]
    MissingHeader(BlockNumberOrTag),
    /// The output of a contract call could not be decoded.
    #[error("failed to decode call output: {0}")]
    Abi(#[from] alloy_sol_types::Error),
    /// Other error.
    #[error("{0}")]
    Other(&'static str),
}

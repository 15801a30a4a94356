//! The crate exposes the L1 providers consumed by the chain iterators and the state indexer, along
//! with their implementations for any alloy [`Provider`](alloy_provider::Provider).

pub use l1::{
    chain::{HeaderStream, L1ChainProvider},
    inbox::InboxConfigProvider,
    L1ProviderError,
};
mod l1;

#[cfg(any(test, feature = "test-utils"))]
/// Common test helpers
pub mod test_utils;

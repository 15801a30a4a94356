//! The Solidity interface of the inbox contract.

/// The inbox contract calls.
pub mod calls;

/// The inbox contract events.
pub mod logs;

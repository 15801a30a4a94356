//! Primitive types for the rollup node inbox indexer.

pub use block::{BlockInfo, Header};
mod block;

pub use config::InboxConfig;
mod config;

pub use inbox::{
    BlobSlice, BondInstruction, BondType, Checkpoint, CoreState, Derivation, DerivationSource,
    InvalidBondType, Proposal, ProposedEventPayload, ProvedEventPayload, Transition,
    TransitionMetadata, TransitionRecord,
};
mod inbox;

pub use payload::{ProposalPayload, TransitionPayload};
mod payload;

//! Inbox protocol types carried by the `Proposed` and `Proved` events.

use alloy_primitives::{Address, B256};
use std::fmt::{Display, Formatter};

/// A proposal submitted to the inbox.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Proposal {
    /// The monotonically increasing proposal id.
    pub id: u64,
    /// The address of the proposer.
    pub proposer: Address,
    /// The L1 timestamp at which the proposal was made.
    pub timestamp: u64,
    /// The timestamp at which the proposer's submission window ends.
    pub end_of_submission_window_timestamp: u64,
    /// The hash of the core state after the proposal.
    pub core_state_hash: B256,
    /// The hash of the [`Derivation`].
    pub derivation_hash: B256,
}

/// The inbox core state recorded alongside each proposal.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct CoreState {
    /// The id of the next proposal.
    pub next_proposal_id: u64,
    /// The L1 block id of the last proposal.
    pub last_proposal_block_id: u64,
    /// The id of the last finalized proposal.
    pub last_finalized_proposal_id: u64,
    /// The timestamp of the last checkpoint.
    pub last_checkpoint_timestamp: u64,
    /// The transition hash of the last finalized proposal.
    pub last_finalized_transition_hash: B256,
    /// The aggregated hash of the pending bond instructions.
    pub bond_instructions_hash: B256,
}

/// A slice of blob data referenced by a derivation source.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct BlobSlice {
    /// The versioned hashes of the blobs.
    pub blob_hashes: Vec<B256>,
    /// The byte offset inside the blobs (uint24 on the wire).
    pub offset: u32,
    /// The timestamp at which the blobs were submitted.
    pub timestamp: u64,
}

/// A source of L2 data for a proposal.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct DerivationSource {
    /// Whether the source is a forced inclusion.
    pub is_forced_inclusion: bool,
    /// The blob slice holding the data.
    pub blob_slice: BlobSlice,
}

/// The data needed to derive the L2 blocks of a proposal.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Derivation {
    /// The L1 block number the proposal originates from.
    pub origin_block_number: u64,
    /// The L1 block hash the proposal originates from.
    pub origin_block_hash: B256,
    /// The percentage of the basefee shared with the proposer.
    pub basefee_sharing_pctg: u8,
    /// The derivation sources.
    pub sources: Vec<DerivationSource>,
}

/// The type of a bond instruction.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[repr(u8)]
pub enum BondType {
    /// No bond.
    #[default]
    None = 0,
    /// Provability bond.
    Provability = 1,
    /// Liveness bond.
    Liveness = 2,
}

/// The error returned when decoding an out of range [`BondType`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InvalidBondType(pub u8);

impl Display for InvalidBondType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid bond type {}", self.0)
    }
}

impl std::error::Error for InvalidBondType {}

impl TryFrom<u8> for BondType {
    type Error = InvalidBondType;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Provability),
            2 => Ok(Self::Liveness),
            other => Err(InvalidBondType(other)),
        }
    }
}

/// A bond movement between a payer and a payee.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct BondInstruction {
    /// The proposal the instruction applies to.
    pub proposal_id: u64,
    /// The raw bond type. Proposal payloads carry it unchecked.
    pub bond_type: u8,
    /// The payer.
    pub payer: Address,
    /// The payee.
    pub payee: Address,
}

impl BondInstruction {
    /// Returns the [`BondType`] of the instruction.
    pub fn typed_bond_type(&self) -> Result<BondType, InvalidBondType> {
        BondType::try_from(self.bond_type)
    }
}

/// An L2 checkpoint.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Checkpoint {
    /// The L2 block number.
    pub block_number: u64,
    /// The L2 block hash.
    pub block_hash: B256,
    /// The L2 state root.
    pub state_root: B256,
}

/// A proven state transition of a proposal.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Transition {
    /// The hash of the proven proposal.
    pub proposal_hash: B256,
    /// The transition hash of the parent proposal. Links transitions into a chain.
    pub parent_transition_hash: B256,
    /// The checkpoint reached by the transition.
    pub checkpoint: Checkpoint,
}

/// The record stored by the inbox for a proven transition.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct TransitionRecord {
    /// The number of proposals covered by the proof.
    pub span: u8,
    /// The bond instructions resulting from the proof.
    pub bond_instructions: Vec<BondInstruction>,
    /// The hash of the [`Transition`].
    pub transition_hash: B256,
    /// The hash of the [`Checkpoint`].
    pub checkpoint_hash: B256,
}

/// The provers involved in a transition.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct TransitionMetadata {
    /// The designated prover.
    pub designated_prover: Address,
    /// The prover that submitted the proof.
    pub actual_prover: Address,
}

/// The decoded body of a `Proposed` event.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct ProposedEventPayload {
    /// The proposal.
    pub proposal: Proposal,
    /// The derivation data of the proposal.
    pub derivation: Derivation,
    /// The core state after the proposal.
    pub core_state: CoreState,
    /// The bond instructions processed with the proposal.
    pub bond_instructions: Vec<BondInstruction>,
}

/// The decoded body of a `Proved` event.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct ProvedEventPayload {
    /// The id of the proven proposal.
    pub proposal_id: u64,
    /// The proven transition.
    pub transition: Transition,
    /// The transition record.
    pub transition_record: TransitionRecord,
    /// The prover metadata.
    pub metadata: TransitionMetadata,
}

use crate::{
    BlockInfo, BondInstruction, CoreState, Derivation, Proposal, ProposedEventPayload,
    ProvedEventPayload, Transition, TransitionMetadata, TransitionRecord,
};

/// A proposal indexed from the L1, along with the block it was observed at.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct ProposalPayload {
    /// The proposal.
    pub proposal: Proposal,
    /// The core state after the proposal.
    pub core_state: CoreState,
    /// The derivation data.
    pub derivation: Derivation,
    /// The bond instructions processed with the proposal.
    pub bond_instructions: Vec<BondInstruction>,
    /// The L1 block the proposal was emitted in.
    pub block_info: BlockInfo,
    /// The timestamp of the L1 block the proposal was emitted in.
    pub block_timestamp: u64,
}

impl ProposalPayload {
    /// Returns a new [`ProposalPayload`] from the decoded event and the block it was emitted in.
    pub fn new(event: ProposedEventPayload, block_info: BlockInfo, block_timestamp: u64) -> Self {
        let ProposedEventPayload { proposal, derivation, core_state, bond_instructions } = event;
        Self { proposal, core_state, derivation, bond_instructions, block_info, block_timestamp }
    }

    /// Returns the proposal id.
    pub const fn id(&self) -> u64 {
        self.proposal.id
    }
}

/// A transition record indexed from the L1, along with the block it was observed at.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct TransitionPayload {
    /// The id of the proven proposal.
    pub proposal_id: u64,
    /// The proven transition.
    pub transition: Transition,
    /// The transition record.
    pub transition_record: TransitionRecord,
    /// The prover metadata.
    pub metadata: TransitionMetadata,
    /// The L1 block the proof was emitted in.
    pub block_info: BlockInfo,
    /// The timestamp of the L1 block the proof was emitted in.
    pub block_timestamp: u64,
}

impl TransitionPayload {
    /// Returns a new [`TransitionPayload`] from the decoded event and the block it was emitted in.
    pub fn new(event: ProvedEventPayload, block_info: BlockInfo, block_timestamp: u64) -> Self {
        let ProvedEventPayload { proposal_id, transition, transition_record, metadata } = event;
        Self { proposal_id, transition, transition_record, metadata, block_info, block_timestamp }
    }

    /// Returns true if the record's block is older than `grace_period` at time `now`.
    pub const fn is_past_grace_period(&self, grace_period: u64, now: u64) -> bool {
        self.block_timestamp.saturating_add(grace_period) <= now
    }
}

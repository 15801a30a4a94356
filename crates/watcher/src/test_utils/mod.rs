use crate::random;
use alloy_primitives::{keccak256, Address, Bytes, LogData, B256};
use alloy_sol_types::SolEvent;
use rollup_node_l1::abi::logs::{BaseFeeConfig, BatchInfo, BatchMetadata, BatchProposed};
use rollup_node_primitives::{
    Checkpoint, CoreState, Proposal, ProposedEventPayload, ProvedEventPayload, Transition,
    TransitionMetadata, TransitionRecord,
};

/// Returns an arbitrary instance of the passed type.
#[macro_export]
macro_rules! random {
    ($typ: ty) => {{
        let mut bytes = Box::new([0u8; size_of::<$typ>()]);
        let mut rng = ::rand::rng();
        ::rand::RngCore::fill_bytes(&mut rng, bytes.as_mut_slice());
        let mut u = ::arbitrary::Unstructured::new(bytes.as_slice());
        <$typ as ::arbitrary::Arbitrary<'_>>::arbitrary(&mut u).unwrap()
    }};
}

/// Returns the transition hash used by the fixtures for the proposal id.
pub fn transition_hash(proposal_id: u64) -> B256 {
    keccak256(proposal_id.to_be_bytes())
}

/// Returns a proposal payload for the id, with a core state finalized up to
/// `last_finalized_proposal_id`.
pub fn proposed_payload(id: u64, last_finalized_proposal_id: u64) -> ProposedEventPayload {
    ProposedEventPayload {
        proposal: Proposal {
            id,
            proposer: random!(Address),
            timestamp: id,
            core_state_hash: random!(B256),
            ..Default::default()
        },
        core_state: CoreState {
            next_proposal_id: id + 1,
            last_finalized_proposal_id,
            last_finalized_transition_hash: transition_hash(last_finalized_proposal_id),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Returns a proof payload for the proposal id, chained to the transition of the previous
/// proposal.
pub fn proved_payload(proposal_id: u64) -> ProvedEventPayload {
    ProvedEventPayload {
        proposal_id,
        transition: Transition {
            proposal_hash: random!(B256),
            parent_transition_hash: transition_hash(proposal_id.saturating_sub(1)),
            checkpoint: Checkpoint {
                block_number: proposal_id,
                block_hash: random!(B256),
                state_root: random!(B256),
            },
        },
        transition_record: TransitionRecord {
            span: 1,
            bond_instructions: vec![],
            transition_hash: transition_hash(proposal_id),
            checkpoint_hash: random!(B256),
        },
        metadata: random!(TransitionMetadata),
    }
}

/// Returns the log data of a pre-fork `BatchProposed` event for the batch id.
pub fn legacy_batch_proposed_log_data(batch_id: u64, proposer: Address) -> LogData {
    let info = BatchInfo {
        txsHash: B256::ZERO,
        blocks: vec![],
        blobHashes: vec![],
        extraData: B256::ZERO,
        coinbase: proposer,
        proposedIn: 0,
        blobCreatedIn: 0,
        blobByteOffset: 0,
        blobByteSize: 0,
        gasLimit: 0,
        baseFee: Default::default(),
        lastBlockId: 0,
        lastBlockTimestamp: 0,
        anchorBlockId: 0,
        anchorBlockHash: B256::ZERO,
        baseFeeConfig: BaseFeeConfig {
            adjustmentQuotient: 0,
            sharingPctg: 0,
            gasIssuancePerSecond: 0,
            minGasExcess: 0,
            maxGasIssuancePerBlock: 0,
        },
    };
    let meta = BatchMetadata {
        infoHash: random!(B256),
        proposer,
        batchId: batch_id,
        proposedAt: 0,
    };

    BatchProposed { info, meta, txList: Bytes::new() }.encode_log_data()
}

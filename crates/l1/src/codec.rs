//! The compact codec used by the inbox to pack the `Proposed` and `Proved` event payloads.
//!
//! Integers are big-endian and sized to their Solidity width (uint48 on 6 bytes, uint24 on 3
//! bytes), addresses take 20 bytes, words 32 bytes and arrays are prefixed with a uint16 length.

use alloy_primitives::{Address, B256};
use rollup_node_primitives::{
    BlobSlice, BondInstruction, BondType, Checkpoint, CoreState, Derivation, DerivationSource,
    InvalidBondType, Proposal, ProposedEventPayload, ProvedEventPayload, Transition,
    TransitionMetadata, TransitionRecord,
};

/// An error that occurred while decoding a compact event payload.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// The payload ended before the field could be read.
    #[error("insufficient data, need {needed} bytes at offset {offset} (have {remaining})")]
    InsufficientData {
        /// The amount of bytes needed.
        needed: usize,
        /// The offset of the read.
        offset: usize,
        /// The remaining bytes in the payload.
        remaining: usize,
    },
    /// The bond type is out of range.
    #[error(transparent)]
    InvalidBondType(#[from] InvalidBondType),
    /// The payload has bytes left after its last field.
    #[error("{remaining} trailing bytes after payload")]
    TrailingData {
        /// The amount of bytes left.
        remaining: usize,
    },
}

/// Decodes the payload of a `Proposed` event.
pub fn decode_proposed_event(data: &[u8]) -> Result<ProposedEventPayload, CodecError> {
    let mut r = Reader::new(data);

    let id = r.read_u48()?;
    let proposer = r.read_address()?;
    let timestamp = r.read_u48()?;
    let end_of_submission_window_timestamp = r.read_u48()?;

    let origin_block_number = r.read_u48()?;
    let origin_block_hash = r.read_b256()?;
    let basefee_sharing_pctg = r.read_u8()?;
    let sources_len = r.read_u16()?;
    let mut sources = Vec::with_capacity(sources_len as usize);
    for _ in 0..sources_len {
        let is_forced_inclusion = r.read_bool()?;
        let hashes_len = r.read_u16()?;
        let blob_hashes = (0..hashes_len).map(|_| r.read_b256()).collect::<Result<_, _>>()?;
        let offset = r.read_u24()?;
        let timestamp = r.read_u48()?;
        sources.push(DerivationSource {
            is_forced_inclusion,
            blob_slice: BlobSlice { blob_hashes, offset, timestamp },
        });
    }

    let core_state_hash = r.read_b256()?;
    let derivation_hash = r.read_b256()?;

    let core_state = CoreState {
        next_proposal_id: r.read_u48()?,
        last_proposal_block_id: r.read_u48()?,
        last_finalized_proposal_id: r.read_u48()?,
        last_checkpoint_timestamp: r.read_u48()?,
        last_finalized_transition_hash: r.read_b256()?,
        bond_instructions_hash: r.read_b256()?,
    };

    let bond_instructions = r.read_bond_instructions(false)?;
    r.finish()?;

    Ok(ProposedEventPayload {
        proposal: Proposal {
            id,
            proposer,
            timestamp,
            end_of_submission_window_timestamp,
            core_state_hash,
            derivation_hash,
        },
        derivation: Derivation {
            origin_block_number,
            origin_block_hash,
            basefee_sharing_pctg,
            sources,
        },
        core_state,
        bond_instructions,
    })
}

/// Decodes the payload of a `Proved` event.
pub fn decode_proved_event(data: &[u8]) -> Result<ProvedEventPayload, CodecError> {
    let mut r = Reader::new(data);

    let proposal_id = r.read_u48()?;
    let transition = Transition {
        proposal_hash: r.read_b256()?,
        parent_transition_hash: r.read_b256()?,
        checkpoint: Checkpoint {
            block_number: r.read_u48()?,
            block_hash: r.read_b256()?,
            state_root: r.read_b256()?,
        },
    };

    let span = r.read_u8()?;
    let transition_hash = r.read_b256()?;
    let checkpoint_hash = r.read_b256()?;
    let metadata = TransitionMetadata {
        designated_prover: r.read_address()?,
        actual_prover: r.read_address()?,
    };
    let bond_instructions = r.read_bond_instructions(true)?;
    r.finish()?;

    Ok(ProvedEventPayload {
        proposal_id,
        transition,
        transition_record: TransitionRecord {
            span,
            bond_instructions,
            transition_hash,
            checkpoint_hash,
        },
        metadata,
    })
}

/// A cursor over a compact payload.
#[derive(Debug)]
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn read(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let remaining = self.data.len() - self.offset;
        if remaining < n {
            return Err(CodecError::InsufficientData { needed: n, offset: self.offset, remaining });
        }
        let bytes = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(bytes)
    }

    fn finish(&self) -> Result<(), CodecError> {
        let remaining = self.data.len() - self.offset;
        if remaining > 0 {
            return Err(CodecError::TrailingData { remaining });
        }
        Ok(())
    }

    fn read_uint(&mut self, n: usize) -> Result<u64, CodecError> {
        debug_assert!(n <= 8);
        Ok(self.read(n)?.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read(1)?[0])
    }

    fn read_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_u8()? != 0)
    }

    fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(self.read_uint(2)? as u16)
    }

    fn read_u24(&mut self) -> Result<u32, CodecError> {
        Ok(self.read_uint(3)? as u32)
    }

    fn read_u48(&mut self) -> Result<u64, CodecError> {
        self.read_uint(6)
    }

    fn read_b256(&mut self) -> Result<B256, CodecError> {
        Ok(B256::from_slice(self.read(32)?))
    }

    fn read_address(&mut self) -> Result<Address, CodecError> {
        Ok(Address::from_slice(self.read(20)?))
    }

    /// Reads a list of bond instructions, rejecting unknown bond types if `check_type` is set.
    fn read_bond_instructions(
        &mut self,
        check_type: bool,
    ) -> Result<Vec<BondInstruction>, CodecError> {
        let len = self.read_u16()?;
        let mut instructions = Vec::with_capacity(len as usize);
        for _ in 0..len {
            let proposal_id = self.read_u48()?;
            let bond_type = self.read_u8()?;
            if check_type {
                BondType::try_from(bond_type)?;
            }
            instructions.push(BondInstruction {
                proposal_id,
                bond_type,
                payer: self.read_address()?,
                payee: self.read_address()?,
            });
        }
        Ok(instructions)
    }
}

/// Encodes the payload of a `Proposed` event.
#[cfg(any(test, feature = "test-utils"))]
pub fn encode_proposed_event(payload: &ProposedEventPayload) -> Vec<u8> {
    let mut w = Writer::default();
    let ProposedEventPayload { proposal, derivation, core_state, bond_instructions } = payload;

    w.write_u48(proposal.id);
    w.write(proposal.proposer.as_slice());
    w.write_u48(proposal.timestamp);
    w.write_u48(proposal.end_of_submission_window_timestamp);

    w.write_u48(derivation.origin_block_number);
    w.write(derivation.origin_block_hash.as_slice());
    w.write(&[derivation.basefee_sharing_pctg]);
    w.write_uint(derivation.sources.len() as u64, 2);
    for source in &derivation.sources {
        w.write(&[source.is_forced_inclusion as u8]);
        w.write_uint(source.blob_slice.blob_hashes.len() as u64, 2);
        for hash in &source.blob_slice.blob_hashes {
            w.write(hash.as_slice());
        }
        w.write_uint(source.blob_slice.offset as u64, 3);
        w.write_u48(source.blob_slice.timestamp);
    }

    w.write(proposal.core_state_hash.as_slice());
    w.write(proposal.derivation_hash.as_slice());

    w.write_u48(core_state.next_proposal_id);
    w.write_u48(core_state.last_proposal_block_id);
    w.write_u48(core_state.last_finalized_proposal_id);
    w.write_u48(core_state.last_checkpoint_timestamp);
    w.write(core_state.last_finalized_transition_hash.as_slice());
    w.write(core_state.bond_instructions_hash.as_slice());

    w.write_bond_instructions(bond_instructions);
    w.0
}

/// Encodes the payload of a `Proved` event.
#[cfg(any(test, feature = "test-utils"))]
pub fn encode_proved_event(payload: &ProvedEventPayload) -> Vec<u8> {
    let mut w = Writer::default();
    let ProvedEventPayload { proposal_id, transition, transition_record, metadata } = payload;

    w.write_u48(*proposal_id);
    w.write(transition.proposal_hash.as_slice());
    w.write(transition.parent_transition_hash.as_slice());
    w.write_u48(transition.checkpoint.block_number);
    w.write(transition.checkpoint.block_hash.as_slice());
    w.write(transition.checkpoint.state_root.as_slice());

    w.write(&[transition_record.span]);
    w.write(transition_record.transition_hash.as_slice());
    w.write(transition_record.checkpoint_hash.as_slice());
    w.write(metadata.designated_prover.as_slice());
    w.write(metadata.actual_prover.as_slice());

    w.write_bond_instructions(&transition_record.bond_instructions);
    w.0
}

#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
struct Writer(Vec<u8>);

#[cfg(any(test, feature = "test-utils"))]
impl Writer {
    fn write(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    fn write_uint(&mut self, value: u64, n: usize) {
        self.0.extend_from_slice(&value.to_be_bytes()[8 - n..]);
    }

    fn write_u48(&mut self, value: u64) {
        self.write_uint(value, 6);
    }

    fn write_bond_instructions(&mut self, instructions: &[BondInstruction]) {
        self.write_uint(instructions.len() as u64, 2);
        for instruction in instructions {
            self.write_u48(instruction.proposal_id);
            self.write(&[instruction.bond_type]);
            self.write(instruction.payer.as_slice());
            self.write(instruction.payee.as_slice());
        }
    }
}

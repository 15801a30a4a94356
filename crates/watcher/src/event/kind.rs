use crate::ChainIteratorError;
use alloy_primitives::{Address, B256};
use alloy_rpc_types_eth::Log;
use alloy_sol_types::SolEvent;
use rollup_node_l1::{
    abi::logs::{BatchProposed, Proposed, Proved},
    decode_proposed_event, decode_proved_event,
};
use rollup_node_primitives::{ProposedEventPayload, ProvedEventPayload};
use std::fmt::{Debug, Display, Formatter};

/// A source of inbox logs, identified by the event signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSource {
    /// The `BatchProposed` event of the pre-fork inbox.
    LegacyBatchProposed,
    /// The `Proposed` event.
    Proposed,
    /// The `Proved` event.
    Proved,
}

impl EventSource {
    /// Returns the topic of the source event.
    pub const fn topic(&self) -> B256 {
        match self {
            Self::LegacyBatchProposed => BatchProposed::SIGNATURE_HASH,
            Self::Proposed => Proposed::SIGNATURE_HASH,
            Self::Proved => Proved::SIGNATURE_HASH,
        }
    }
}

impl Display for EventSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::LegacyBatchProposed => "BatchProposed",
            Self::Proposed => "Proposed",
            Self::Proved => "Proved",
        };
        f.write_str(name)
    }
}

/// A kind of inbox event iterated by an [`EventIterator`](crate::EventIterator).
pub trait EventKind: Send + Sync + 'static {
    /// The decoded event.
    type Event: Debug + Send + Sync + 'static;

    /// The log sources of the kind, in query order.
    const SOURCES: &'static [EventSource];

    /// Decodes a log from the provided source.
    fn decode(source: EventSource, log: &Log) -> Result<Self::Event, ChainIteratorError>;

    /// Returns the id used to check the continuity of the events of a source.
    fn sequence_id(event: &Self::Event) -> u64;
}

/// A batch proposed to the pre-fork inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyBatchProposal {
    /// The batch id.
    pub batch_id: u64,
    /// The proposer of the batch.
    pub proposer: Address,
    /// The timestamp of the proposal.
    pub proposed_at: u64,
    /// The hash of the batch info.
    pub info_hash: B256,
}

/// A proposal event, from the pre-fork or the current inbox.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::From)]
pub enum ProposedEvent {
    /// A pre-fork batch proposal.
    Legacy(LegacyBatchProposal),
    /// A proposal.
    Proposed(ProposedEventPayload),
}

/// The proposal events: pre-fork `BatchProposed` events, followed by `Proposed` events.
#[derive(Debug, Clone, Copy)]
pub struct ProposedEvents;

impl EventKind for ProposedEvents {
    type Event = ProposedEvent;

    const SOURCES: &'static [EventSource] =
        &[EventSource::LegacyBatchProposed, EventSource::Proposed];

    fn decode(source: EventSource, log: &Log) -> Result<Self::Event, ChainIteratorError> {
        Ok(match source {
            EventSource::LegacyBatchProposed => {
                let meta = BatchProposed::decode_log(&log.inner)?.data.meta;
                LegacyBatchProposal {
                    batch_id: meta.batchId,
                    proposer: meta.proposer,
                    proposed_at: meta.proposedAt,
                    info_hash: meta.infoHash,
                }
                .into()
            }
            _ => {
                let data = Proposed::decode_log(&log.inner)?.data.data;
                decode_proposed_event(&data)?.into()
            }
        })
    }

    fn sequence_id(event: &Self::Event) -> u64 {
        match event {
            ProposedEvent::Legacy(batch) => batch.batch_id,
            ProposedEvent::Proposed(payload) => payload.proposal.id,
        }
    }
}

/// The proof events.
#[derive(Debug, Clone, Copy)]
pub struct ProvedEvents;

impl EventKind for ProvedEvents {
    type Event = ProvedEventPayload;

    const SOURCES: &'static [EventSource] = &[EventSource::Proved];

    fn decode(_source: EventSource, log: &Log) -> Result<Self::Event, ChainIteratorError> {
        let data = Proved::decode_log(&log.inner)?.data.data;
        Ok(decode_proved_event(&data)?)
    }

    fn sequence_id(event: &Self::Event) -> u64 {
        event.proposal_id
    }
}

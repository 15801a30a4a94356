//! A library containing the inbox contract interface and the compact event payload codec.

pub mod abi;

pub mod codec;
pub use codec::{decode_proposed_event, decode_proved_event, CodecError};

#[cfg(any(test, feature = "test-utils"))]
pub use codec::{encode_proposed_event, encode_proved_event};

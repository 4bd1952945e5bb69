/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits that the surrounding node implements to turn stored blocks into wire payloads and raw bytes
//! into transactions.
//!
//! The binary formats of blocks, headers and transactions belong to the node, not to this crate. The
//! sync and relay core only ever moves them around as opaque bytes, asking these traits whenever it
//! needs to look inside.

use std::fmt::{self, Display, Formatter};

use crate::types::{
    block::BlockMeta,
    data_types::{Payload, PayloadKind, TransactionId},
};

/// Serializes admitted blocks into the payloads streamed to peers.
///
/// Implementations must be deterministic: the same block and kind must always produce the same
/// payload, so that repeated range queries return identical streams.
pub trait BlockCodec: Send + Sync + 'static {
    /// Serialize the block described by `meta`, whose admitted content is `content`, into a payload of
    /// the requested `kind`.
    fn encode(
        &self,
        meta: &BlockMeta,
        content: &[u8],
        kind: PayloadKind,
    ) -> Result<Payload, CodecError>;
}

/// Decodes raw transactions submitted by peers.
pub trait TransactionCodec: Send + Sync + 'static {
    /// The decoded transaction, as understood by the node's
    /// [`LedgerValidator`](crate::ledger::LedgerValidator).
    type Transaction: Send;

    fn decode_transaction(&self, raw: &[u8]) -> Result<Self::Transaction, CodecError>;

    fn transaction_id(&self, transaction: &Self::Transaction) -> TransactionId;
}

/// Error returned by a codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The bytes are not a valid encoding.
    Malformed { reason: String },

    /// The codec cannot produce payloads of this kind.
    UnsupportedKind { kind: PayloadKind },
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Malformed { reason } => write!(f, "malformed encoding: {}", reason),
            CodecError::UnsupportedKind { kind } => write!(f, "unsupported payload kind {:?}", kind),
        }
    }
}

impl std::error::Error for CodecError {}

/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Pieces shared by the [range](crate::range_reader) and [catch-up](crate::catch_up) streams.
//!
//! Both streams capture their frontier under one short-lived snapshot and then load each block they
//! emit under a fresh snapshot. Block records are write-once, so a block id captured earlier always
//! resolves to the same metadata and content, no matter what the canonical chain looks like by then.

use std::fmt::{self, Display, Formatter};

use crate::chain_index::{
    accessors::{internal::ChainIndexError, public::ChainIndexCamera},
    pluggables::KVStore,
};
use crate::codec::{BlockCodec, CodecError};
use crate::types::{
    block::BlockMeta,
    data_types::{BlockId, Payload, PayloadKind},
};

/// Error yielded as an item of a block stream.
///
/// A stream that yields an error should be considered finished; the surrounding call mechanism is
/// expected to abort the response.
#[derive(Debug)]
pub enum StreamError {
    ChainIndex(ChainIndexError),
    Codec(CodecError),
}

impl Display for StreamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::ChainIndex(err) => write!(f, "chain index error: {}", err),
            StreamError::Codec(err) => write!(f, "codec error: {}", err),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<ChainIndexError> for StreamError {
    fn from(value: ChainIndexError) -> Self {
        StreamError::ChainIndex(value)
    }
}

impl From<CodecError> for StreamError {
    fn from(value: CodecError) -> Self {
        StreamError::Codec(value)
    }
}

/// Load `block` under a fresh snapshot and serialize it into a payload of `kind`.
///
/// The snapshot is released before the codec runs.
pub(crate) fn load_payload<K: KVStore, C: BlockCodec>(
    camera: &ChainIndexCamera<K>,
    codec: &C,
    block: &BlockId,
    kind: PayloadKind,
) -> Result<(BlockMeta, Payload), StreamError> {
    let (meta, content) = {
        let snapshot = camera.snapshot();
        let meta = snapshot
            .meta_of(block)
            .map_err(|err| expected_block(err, block))?;
        let content = snapshot
            .block_content(block)
            .map_err(|err| expected_block(err, block))?;
        (meta, content)
    };

    let payload = codec.encode(&meta, &content, kind)?;
    Ok((meta, payload))
}

// A block id captured by a stream was indexed once, so finding it missing now means corruption.
fn expected_block(err: ChainIndexError, block: &BlockId) -> ChainIndexError {
    match err {
        ChainIndexError::UnknownBlock { .. } => {
            ChainIndexError::BlockExpectedButNotFound { block: *block }
        }
        err => err,
    }
}

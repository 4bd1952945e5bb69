/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Serving `GetBlocks` and `GetHeaders`: backward ranges of blocks starting from an anchor.
//!
//! A range is described by an anchor block, an `offset` (number of parent links to follow from the
//! anchor before the first emitted block) and a `size` (maximum number of blocks to emit). Blocks are
//! emitted from the offset position towards genesis:
//!
//! ```text
//!  genesis ◀── b1 ◀── b2 ◀── b3 ◀── b4 (anchor)
//!
//!  read(b4, offset = 1, size = 2) yields b3, b2
//! ```
//!
//! Reaching genesis before `offset` parent links have been followed, or before `size` blocks have been
//! emitted, truncates the range. Truncation is never an error.

use std::sync::Arc;

use crate::chain_index::{
    accessors::{internal::ChainIndexError, public::ChainIndexCamera},
    pluggables::KVStore,
};
use crate::codec::BlockCodec;
use crate::stream::{load_payload, StreamError};
use crate::types::data_types::{BlockId, Payload, PayloadKind};

/// Resolve the range `(anchor, offset, size)` and return a lazy stream of its payloads.
///
/// Fails with [`UnknownBlock`](ChainIndexError::UnknownBlock) if `anchor` is not indexed. The offset
/// position is resolved here, under a single snapshot; the stream then walks from it independently of
/// later changes to the canonical chain.
pub fn read<K: KVStore, C: BlockCodec>(
    camera: &ChainIndexCamera<K>,
    codec: Arc<C>,
    anchor: &BlockId,
    offset: u64,
    size: u64,
    kind: PayloadKind,
) -> Result<RangeStream<K, C>, ChainIndexError> {
    let start = {
        let snapshot = camera.snapshot();
        let mut position = Some(*anchor);
        for meta in snapshot.ancestors_from(anchor, offset)? {
            position = meta?.parent;
        }
        position
    };

    Ok(RangeStream {
        camera: camera.clone(),
        codec,
        kind,
        cursor: if size == 0 { None } else { start },
        remaining: size,
    })
}

/// Lazy stream of the payloads in a range, from the offset position towards genesis.
///
/// Each step takes its own short-lived snapshot, so holding on to a `RangeStream` never blocks writers
/// of the chain index. Dropping the stream is the way to cancel it.
pub struct RangeStream<K: KVStore, C: BlockCodec> {
    camera: ChainIndexCamera<K>,
    codec: Arc<C>,
    kind: PayloadKind,
    cursor: Option<BlockId>,
    remaining: u64,
}

impl<K: KVStore, C: BlockCodec> RangeStream<K, C> {
    /// The kind of payload this stream yields.
    pub fn kind(&self) -> PayloadKind {
        self.kind
    }
}

impl<K: KVStore, C: BlockCodec> Iterator for RangeStream<K, C> {
    type Item = Result<Payload, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let block = self.cursor.take()?;

        match load_payload(&self.camera, self.codec.as_ref(), &block, self.kind) {
            Ok((meta, payload)) => {
                self.remaining -= 1;
                self.cursor = meta.parent;
                Some(Ok(payload))
            }
            // The cursor stays empty, so the stream ends after reporting the error.
            Err(err) => Some(Err(err)),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.cursor.is_none() || self.remaining == 0 {
            (0, Some(0))
        } else {
            (1, usize::try_from(self.remaining).ok())
        }
    }
}


/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Serving `PullBlocksToTip`: bringing a lagging peer up to the canonical tip.
//!
//! The peer sends its frontier: an ordered list of block ids it believes are on its chain, usually
//! newest first. The resolver picks the first of them that this node knows to be canonical (the
//! **ancestor**), then streams every canonical block after it, oldest first, so that the peer can
//! apply them in order:
//!
//! ```text
//!  frontier: [x (unknown), b2 (canonical), b1]
//!
//!  genesis ◀── b1 ◀── b2 ◀── b3 ◀── b4 (tip)
//!                      ▲
//!                   ancestor        stream: b3, b4
//! ```
//!
//! The chain index only links blocks backwards, so the path is derived by walking from the tip back to
//! the ancestor and reversing. The whole path is captured under one snapshot before the first block is
//! emitted; a reorg that happens afterwards does not affect the stream.

use std::sync::Arc;
use std::vec;

use crate::chain_index::{
    accessors::{internal::ChainIndexError, public::ChainIndexCamera},
    pluggables::KVStore,
};
use crate::codec::BlockCodec;
use crate::stream::{load_payload, StreamError};
use crate::types::data_types::{BlockId, Payload, PayloadKind};

/// Find the common ancestor of `candidates` and this node's canonical chain, and return a lazy stream
/// of the canonical blocks after it.
///
/// Fails with [`NoCommonAncestor`](ChainIndexError::NoCommonAncestor) before producing any stream if
/// no candidate is an indexed, canonical block. If `limit` is `Some(n)`, only the `n` oldest blocks
/// after the ancestor are streamed.
pub fn pull_to_tip<K: KVStore, C: BlockCodec>(
    camera: &ChainIndexCamera<K>,
    codec: Arc<C>,
    candidates: &[BlockId],
    limit: Option<u64>,
) -> Result<PullStream<K, C>, ChainIndexError> {
    let (ancestor, tip, mut path) = {
        let snapshot = camera.snapshot();
        let ancestor = snapshot.common_ancestor(candidates)?;
        let tip = snapshot.tip()?;
        let path = snapshot.blocks_from_ancestor_to(&ancestor, &tip)?;
        (ancestor, tip, path)
    };

    if let Some(limit) = limit {
        path.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    }

    Ok(PullStream {
        camera: camera.clone(),
        codec,
        ancestor,
        tip,
        path: path.into_iter(),
    })
}

/// Lazy stream of full blocks from just after the common ancestor towards the tip, oldest first.
pub struct PullStream<K: KVStore, C: BlockCodec> {
    camera: ChainIndexCamera<K>,
    codec: Arc<C>,
    ancestor: BlockId,
    tip: BlockId,
    path: vec::IntoIter<BlockId>,
}

impl<K: KVStore, C: BlockCodec> PullStream<K, C> {
    /// The candidate that was selected as the common ancestor.
    pub fn ancestor(&self) -> &BlockId {
        &self.ancestor
    }

    /// The tip captured when the stream was created.
    pub fn tip(&self) -> &BlockId {
        &self.tip
    }

    /// Number of blocks left on the captured path. An error ends the stream early, so this is an upper
    /// bound on the items still to come.
    pub fn remaining(&self) -> usize {
        self.path.len()
    }
}

impl<K: KVStore, C: BlockCodec> Iterator for PullStream<K, C> {
    type Item = Result<Payload, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.path.next()?;
        match load_payload(&self.camera, self.codec.as_ref(), &block, PayloadKind::Block) {
            Ok((_, payload)) => Some(Ok(payload)),
            Err(err) => {
                // Drain the path so that the stream ends after the error.
                self.path = Vec::new().into_iter();
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.path.len()))
    }
}

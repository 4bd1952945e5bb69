/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! General purpose, read-only interface for querying the Chain Index.

use crate::types::{block::BlockMeta, data_types::BlockId};

use super::super::pluggables::{KVGet, KVStore};

use super::internal::ChainIndexError;

/// A factory for [`ChainIndexSnapshot`]s.
///
/// Cameras are cheap to clone and can be handed to any number of reader threads. Each snapshot taken
/// through a camera should be short-lived: key-value stores are free to block writers for as long as a
/// snapshot is alive.
#[derive(Clone)]
pub struct ChainIndexCamera<K: KVStore>(K);

impl<K: KVStore> ChainIndexCamera<K> {
    pub fn new(kv_store: K) -> Self {
        ChainIndexCamera(kv_store)
    }

    pub fn snapshot(&self) -> ChainIndexSnapshot<K::Snapshot<'_>> {
        ChainIndexSnapshot(self.0.snapshot())
    }
}

/// A read-only view into the chain index that is guaranteed to stay unchanged.
pub struct ChainIndexSnapshot<S: KVGet>(pub(super) S);

impl<S: KVGet> ChainIndexSnapshot<S> {
    pub(crate) fn new(kv_snapshot: S) -> Self {
        ChainIndexSnapshot(kv_snapshot)
    }

    /* ↓↓↓ Tip ↓↓↓ */

    /// Get the tip of the canonical chain.
    pub fn tip(&self) -> Result<BlockId, ChainIndexError> {
        self.0.tip()?.ok_or(ChainIndexError::EmptyChain)
    }

    /// Get the metadata of the tip of the canonical chain.
    pub fn tip_meta(&self) -> Result<BlockMeta, ChainIndexError> {
        let tip = self.tip()?;
        self.0
            .block_meta(&tip)?
            .ok_or(ChainIndexError::BlockExpectedButNotFound { block: tip })
    }

    /* ↓↓↓ Blocks ↓↓↓ */

    pub fn meta_of(&self, block: &BlockId) -> Result<BlockMeta, ChainIndexError> {
        self.0
            .block_meta(block)?
            .ok_or(ChainIndexError::UnknownBlock { block: *block })
    }

    pub fn contains(&self, block: &BlockId) -> Result<bool, ChainIndexError> {
        Ok(self.0.block_chain_length(block)?.is_some())
    }

    /// Get the serialized block as it was admitted.
    pub fn block_content(&self, block: &BlockId) -> Result<Vec<u8>, ChainIndexError> {
        self.0
            .block_content(block)
            .ok_or(ChainIndexError::UnknownBlock { block: *block })
    }

    /* ↓↓↓ Ancestry ↓↓↓ */

    /// Iterate over at most `count` blocks starting at `block` and following parent links towards
    /// genesis, most recent first.
    ///
    /// The walk stops at genesis without error. Since parent links never change, walking again from the
    /// same `block` yields the same sequence.
    pub fn ancestors_from(
        &self,
        block: &BlockId,
        count: u64,
    ) -> Result<Ancestors<'_, S>, ChainIndexError> {
        if !self.contains(block)? {
            return Err(ChainIndexError::UnknownBlock { block: *block });
        }

        Ok(Ancestors {
            snapshot: self,
            cursor: Some(*block),
            remaining: count,
        })
    }

    /// Get the first of `candidates`, in the given order, that is indexed and on the canonical chain.
    pub fn common_ancestor(&self, candidates: &[BlockId]) -> Result<BlockId, ChainIndexError> {
        for candidate in candidates {
            if self.contains(candidate)? && self.0.block_is_canonical(candidate)? {
                return Ok(*candidate);
            }
        }
        Err(ChainIndexError::NoCommonAncestor)
    }

    /// Get the canonical blocks strictly after `ancestor` up to and including `tip`, oldest first.
    ///
    /// `ancestor` must be an ancestor of `tip` (or `tip` itself, in which case the result is empty).
    pub fn blocks_from_ancestor_to(
        &self,
        ancestor: &BlockId,
        tip: &BlockId,
    ) -> Result<Vec<BlockId>, ChainIndexError> {
        let mut path = Vec::new();
        let mut cursor = *tip;
        while cursor != *ancestor {
            path.push(cursor);
            // Running past genesis means `ancestor` was not on the path.
            cursor = self
                .0
                .block_parent(&cursor)?
                .ok_or(ChainIndexError::BlockExpectedButNotFound { block: *ancestor })?;
        }
        path.reverse();
        Ok(path)
    }
}

/// Lazy, backward walk over the chain index produced by
/// [`ancestors_from`](ChainIndexSnapshot::ancestors_from).
pub struct Ancestors<'a, S: KVGet> {
    snapshot: &'a ChainIndexSnapshot<S>,
    cursor: Option<BlockId>,
    remaining: u64,
}

impl<'a, S: KVGet> Iterator for Ancestors<'a, S> {
    type Item = Result<BlockMeta, ChainIndexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let block = self.cursor.take()?;

        match self.snapshot.0.block_meta(&block) {
            Ok(Some(meta)) => {
                self.remaining -= 1;
                self.cursor = meta.parent;
                Some(Ok(meta))
            }
            // A parent link pointing at nothing: the walk cannot continue.
            Ok(None) => Some(Err(ChainIndexError::BlockExpectedButNotFound { block })),
            Err(err) => Some(Err(err.into())),
        }
    }
}

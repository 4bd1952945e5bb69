/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Rules and predicates that help with maintaining the invariant properties of the Chain Index.
//!
//! The chain index maintains two invariants:
//! 1. **Rooted ancestry**: every indexed block other than genesis has an indexed parent, a chain length
//!    one greater than its parent's, and a date strictly greater than its parent's.
//! 2. **Linear canonical chain**: the blocks with the canonical flag set are exactly the blocks on the
//!    path from the tip back to genesis.
//!
//! [`safe_block`] guards the first invariant on admission. [`branch_to_canonical`] and
//! [`canonical_above`] compute the flag changes that keep the second invariant true when the tip moves.
//!
//! A violation discovered while walking (a missing parent, a walk that runs past genesis without
//! meeting the canonical chain) is reported as
//! [`BlockExpectedButNotFound`](ChainIndexError::BlockExpectedButNotFound). It means the underlying
//! storage is corrupted; it is never a protocol error.

use crate::types::{block::Block, data_types::{BlockId, ChainLength}};

use super::{accessors::internal::ChainIndexError, pluggables::KVGet};

/// Check whether `block` can be admitted into the chain index, and return its chain length if so.
pub(crate) fn safe_block<S: KVGet>(kv: &S, block: &Block) -> Result<ChainLength, ChainIndexError> {
    if kv.block_chain_length(&block.id)?.is_some() {
        return Err(ChainIndexError::DuplicateBlock { block: block.id });
    }

    let parent = block
        .parent
        .ok_or(ChainIndexError::MissingParent { block: block.id })?;
    let parent_chain_length =
        kv.block_chain_length(&parent)?
            .ok_or(ChainIndexError::UnknownParent {
                block: block.id,
                parent,
            })?;

    let parent_date = kv.block_date(&parent)?;
    if block.date <= parent_date {
        return Err(ChainIndexError::NonIncreasingDate {
            block: block.id,
            date: block.date,
            parent_date,
        });
    }

    Ok(parent_chain_length.next())
}

/// Walk from `from` towards genesis until reaching a canonical block.
///
/// Returns that canonical block (the fork point) and the non-canonical blocks visited on the way, from
/// newest (`from` itself, unless it is canonical) to oldest.
pub(crate) fn branch_to_canonical<S: KVGet>(
    kv: &S,
    from: &BlockId,
) -> Result<(BlockId, Vec<BlockId>), ChainIndexError> {
    let mut branch = Vec::new();
    let mut cursor = *from;
    loop {
        if kv.block_chain_length(&cursor)?.is_none() {
            return Err(ChainIndexError::BlockExpectedButNotFound { block: cursor });
        }
        if kv.block_is_canonical(&cursor)? {
            return Ok((cursor, branch));
        }
        branch.push(cursor);
        cursor = kv
            .block_parent(&cursor)?
            .ok_or(ChainIndexError::BlockExpectedButNotFound { block: cursor })?;
    }
}

/// Collect the canonical blocks strictly above `fork_point`, from the tip (newest) down.
///
/// `fork_point` must be canonical.
pub(crate) fn canonical_above<S: KVGet>(
    kv: &S,
    fork_point: &BlockId,
) -> Result<Vec<BlockId>, ChainIndexError> {
    let mut above = Vec::new();
    let mut cursor = kv.tip()?.ok_or(ChainIndexError::EmptyChain)?;
    while cursor != *fork_point {
        above.push(cursor);
        cursor = kv
            .block_parent(&cursor)?
            .ok_or(ChainIndexError::BlockExpectedButNotFound { block: *fork_point })?;
    }
    Ok(above)
}

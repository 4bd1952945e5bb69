/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the [`Block`] that gets admitted into the chain index, and the [`BlockMeta`] that
//! the chain index keeps about every admitted block.

use borsh::{BorshDeserialize, BorshSerialize};

use super::data_types::{BlockId, ChainDate, ChainLength};

/// A block as handed to the chain index for admission.
///
/// `content` is the block exactly as produced by the surrounding node's encoder. The chain index
/// never looks inside it; it is passed back to the [`BlockCodec`](crate::codec::BlockCodec) when a
/// peer asks for the block or its header.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Block {
    pub id: BlockId,
    pub parent: Option<BlockId>,
    pub date: ChainDate,
    pub content: Vec<u8>,
}

impl Block {
    pub fn new(id: BlockId, parent: Option<BlockId>, date: ChainDate, content: Vec<u8>) -> Self {
        Self {
            id,
            parent,
            date,
            content,
        }
    }
}

/// Metadata the chain index keeps about an admitted block.
///
/// Everything except `is_canonical` is fixed when the block is admitted. `is_canonical` is flipped by
/// [`set_tip`](crate::chain_index::accessors::internal::ChainIndexSingleton::set_tip) when the
/// canonical chain changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockMeta {
    pub id: BlockId,
    pub parent: Option<BlockId>,
    pub chain_length: ChainLength,
    pub date: ChainDate,
    pub is_canonical: bool,
}

impl BlockMeta {
    pub fn is_genesis(&self) -> bool {
        self.parent.is_none()
    }
}

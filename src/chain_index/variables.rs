/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Byte-prefixes that specify where each Chain Index variable is stored in the user-provided key-value
//! store.
//!
//! # Storage of state variables
//!
//! The chain index is comprised of two state variables:
//! - **Blocks** ([`BlockId`](crate::types::data_types::BlockId) -> block record).
//! - **Tip** ([`BlockId`](crate::types::data_types::BlockId)): the newest block of the canonical chain.
//!
//! Every value is stored **Borsh-serialized**.
//!
//! ## Single values
//!
//! The tip is stored at the one-byte, constant key [`TIP`].
//!
//! ## Blocks
//!
//! Each field of a block record is stored as a separate value at a key formed by concatenating three
//! bytestrings in sequence:
//! 1. The [`BLOCKS`] constant.
//! 2. `block.id`.
//! 3. A constant byte sharing the same name as the field (e.g., for a block's parent, this byte is
//!    [`BLOCK_PARENT`]).
//!
//! The chain length field doubles as the existence marker of a block: if a block exists in the chain
//! index, its chain length key is always set, and so are all of its other fields.
//!
//! Every field except [`BLOCK_CANONICAL`] is written exactly once, when the block is admitted.

// State variables
pub const BLOCKS: [u8; 1] = [0];
pub const TIP: [u8; 1] = [1];

// Fields of a block record
pub const BLOCK_PARENT: [u8; 1] = [0];
pub const BLOCK_CHAIN_LENGTH: [u8; 1] = [1];
pub const BLOCK_DATE: [u8; 1] = [2];
pub const BLOCK_CANONICAL: [u8; 1] = [3];
pub const BLOCK_CONTENT: [u8; 1] = [4];

fn concat(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut res = Vec::with_capacity(a.len() + b.len());
    res.extend_from_slice(a);
    res.extend_from_slice(b);
    res
}

/// Key of the `field` of the block record identified by `block`.
pub(crate) fn block_field(block: &[u8; 32], field: &[u8]) -> Vec<u8> {
    concat(&concat(&BLOCKS, block), field)
}

/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits for pluggable Chain Index persistence.
//!
//! The chain index does not care how its variables are stored, only that the storage offers the
//! abstract functionality of a key-value store with atomic, batched writes and consistent snapshots.
//! Given a method to obtain the value for a given key in bytes ([`KVGet::get`]), this module also
//! provides methods to obtain the typed variables described in [`variables`](super::variables).

use std::fmt::{self, Display, Formatter};

use borsh::BorshDeserialize;

use crate::types::{
    block::BlockMeta,
    data_types::{BlockId, ChainDate, ChainLength},
};

use super::variables::{self, block_field};

pub trait KVStore: KVGet + Clone + Send + 'static {
    type WriteBatch: WriteBatch;
    type Snapshot<'a>: 'a + KVGet;

    fn write(&mut self, wb: Self::WriteBatch);
    fn clear(&mut self);
    fn snapshot<'b>(&'b self) -> Self::Snapshot<'_>;
}

pub trait WriteBatch {
    fn new() -> Self;
    fn set(&mut self, key: &[u8], value: &[u8]);
    fn delete(&mut self, key: &[u8]);
}

pub trait KVGet {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /* ↓↓↓ Block ↓↓↓  */

    fn block_meta(&self, block: &BlockId) -> Result<Option<BlockMeta>, KVGetError> {
        // Safety: if the chain length is Some, then all of the following fields are set too.
        let chain_length = match self.block_chain_length(block)? {
            Some(chain_length) => chain_length,
            None => return Ok(None),
        };
        let parent = self.block_parent(block)?;
        let date = self.block_date(block)?;
        let is_canonical = self.block_is_canonical(block)?;

        Ok(Some(BlockMeta {
            id: *block,
            parent,
            chain_length,
            date,
            is_canonical,
        }))
    }

    fn block_chain_length(&self, block: &BlockId) -> Result<Option<ChainLength>, KVGetError> {
        if let Some(bytes) = self.get(&block_field(&block.bytes(), &variables::BLOCK_CHAIN_LENGTH))
        {
            Ok(Some(ChainLength::deserialize(&mut bytes.as_slice()).map_err(
                |err| KVGetError::DeserializeValueError {
                    key: Key::BlockChainLength { block: *block },
                    source: err,
                },
            )?))
        } else {
            Ok(None)
        }
    }

    fn block_parent(&self, block: &BlockId) -> Result<Option<BlockId>, KVGetError> {
        Option::<BlockId>::deserialize(
            &mut &*self
                .get(&block_field(&block.bytes(), &variables::BLOCK_PARENT))
                .ok_or(KVGetError::ValueExpectedButNotFound {
                    key: Key::BlockParent { block: *block },
                })?,
        )
        .map_err(|err| KVGetError::DeserializeValueError {
            key: Key::BlockParent { block: *block },
            source: err,
        })
    }

    fn block_date(&self, block: &BlockId) -> Result<ChainDate, KVGetError> {
        ChainDate::deserialize(
            &mut &*self
                .get(&block_field(&block.bytes(), &variables::BLOCK_DATE))
                .ok_or(KVGetError::ValueExpectedButNotFound {
                    key: Key::BlockDate { block: *block },
                })?,
        )
        .map_err(|err| KVGetError::DeserializeValueError {
            key: Key::BlockDate { block: *block },
            source: err,
        })
    }

    fn block_is_canonical(&self, block: &BlockId) -> Result<bool, KVGetError> {
        bool::deserialize(
            &mut &*self
                .get(&block_field(&block.bytes(), &variables::BLOCK_CANONICAL))
                .ok_or(KVGetError::ValueExpectedButNotFound {
                    key: Key::BlockCanonical { block: *block },
                })?,
        )
        .map_err(|err| KVGetError::DeserializeValueError {
            key: Key::BlockCanonical { block: *block },
            source: err,
        })
    }

    fn block_content(&self, block: &BlockId) -> Option<Vec<u8>> {
        self.get(&block_field(&block.bytes(), &variables::BLOCK_CONTENT))
    }

    /* ↓↓↓ Tip ↓↓↓ */

    fn tip(&self) -> Result<Option<BlockId>, KVGetError> {
        if let Some(bytes) = self.get(&variables::TIP) {
            let tip = BlockId::deserialize(&mut &*bytes).map_err(|err| {
                KVGetError::DeserializeValueError {
                    key: Key::Tip,
                    source: err,
                }
            })?;
            Ok(Some(tip))
        } else {
            Ok(None)
        }
    }
}

/// Error when trying to read a value corresponding to a given key from the [key value store][KVStore].
/// The error may arise in the following circumstances:
/// 1. The value corresponding to a given key cannot be deserialized into its expected type,
/// 2. The value corresponding to a given key cannot be found, even though the existence marker of its
///    block record is set.
#[derive(Debug)]
pub enum KVGetError {
    DeserializeValueError { key: Key, source: std::io::Error },
    ValueExpectedButNotFound { key: Key },
}

impl Display for KVGetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            KVGetError::DeserializeValueError { key, source } => {
                write!(f, "failed to deserialize {}: {}", key, source)
            }
            KVGetError::ValueExpectedButNotFound { key } => {
                write!(f, "{} expected but not found", key)
            }
        }
    }
}

impl std::error::Error for KVGetError {}

#[derive(Debug)]
pub enum Key {
    BlockParent { block: BlockId },
    BlockChainLength { block: BlockId },
    BlockDate { block: BlockId },
    BlockCanonical { block: BlockId },
    Tip,
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Key::BlockParent { block } => write!(f, "Block Parent for block {}", block),
            Key::BlockChainLength { block } => write!(f, "Block Chain Length for block {}", block),
            Key::BlockDate { block } => write!(f, "Block Date for block {}", block),
            Key::BlockCanonical { block } => write!(f, "Block Canonical flag for block {}", block),
            Key::Tip => write!(f, "Tip"),
        }
    }
}

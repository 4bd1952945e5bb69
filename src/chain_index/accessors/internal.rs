/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Read-and-write handle used by the owner of the canonical chain to mutate the Chain Index.
//!
//! # Initializing the Chain Index
//!
//! The chain index starts out empty. Before anything else, it must be given a genesis block using
//! [`initialize`](ChainIndexSingleton::initialize). Until then, every tip query fails with
//! [`EmptyChain`](ChainIndexError::EmptyChain).
//!
//! # Mutations
//!
//! There are three top-level mutators: [`insert_block`](ChainIndexSingleton::insert_block),
//! [`set_tip`](ChainIndexSingleton::set_tip), and [`append`](ChainIndexSingleton::append). Each of
//! them builds a single [`ChainIndexWriteBatch`] and writes it atomically, so readers holding a
//! [`ChainIndexSnapshot`](super::public::ChainIndexSnapshot) never observe a half-applied reorg.
//!
//! Deciding *which* block should become the tip (fork choice) is not the chain index's business:
//! callers make that decision and then call `set_tip`.

use std::{
    fmt::{self, Display, Formatter},
    sync::mpsc::Sender,
    time::SystemTime,
};

use borsh::BorshSerialize;

use crate::{
    events::{Event, InsertBlockEvent, UpdateTipEvent},
    types::{
        block::{Block, BlockMeta},
        data_types::{BlockId, ChainDate, ChainLength},
    },
};

use super::super::{
    invariants,
    pluggables::{KVGet, KVGetError, KVStore, Key, WriteBatch},
    variables::{self, block_field},
};

/// Read and write handle into the chain index that should be owned by exactly one writer.
pub struct ChainIndexSingleton<K: KVStore>(K);

/// Lifecycle methods.
impl<K: KVStore> ChainIndexSingleton<K> {
    /// Create a new instance of `ChainIndexSingleton` on top of `kv_store`.
    pub fn new(kv_store: K) -> Self {
        ChainIndexSingleton(kv_store)
    }

    /// Admit `genesis` as the first block and the canonical tip.
    ///
    /// Fails if the chain index already has a tip, or if `genesis` has a parent.
    pub fn initialize(
        &mut self,
        genesis: &Block,
        event_publisher: &Option<Sender<Event>>,
    ) -> Result<(), ChainIndexError> {
        if self.0.tip()?.is_some() {
            return Err(ChainIndexError::AlreadyInitialized);
        }
        if let Some(parent) = genesis.parent {
            return Err(ChainIndexError::GenesisWithParent {
                block: genesis.id,
                parent,
            });
        }

        let mut wb = ChainIndexWriteBatch::new();
        wb.set_block(genesis, ChainLength::genesis(), true)?;
        wb.set_tip(&genesis.id)?;
        self.write(wb);

        Event::InsertBlock(InsertBlockEvent {
            timestamp: SystemTime::now(),
            block: genesis.id,
            chain_length: ChainLength::genesis(),
            date: genesis.date,
        })
        .publish(event_publisher);

        Ok(())
    }

    /// Atomically write the changes in `write_batch` into the `ChainIndexSingleton`.
    pub fn write(&mut self, write_batch: ChainIndexWriteBatch<K::WriteBatch>) {
        self.0.write(write_batch.0)
    }
}

/// Top-level state updaters.
impl<K: KVStore> ChainIndexSingleton<K> {
    /// Admit `block` into the chain index without making it canonical.
    ///
    /// ## Preconditions
    ///
    /// [`safe_block`](invariants::safe_block): the block is new, its parent is indexed, and its date is
    /// strictly greater than its parent's.
    pub fn insert_block(
        &mut self,
        block: &Block,
        event_publisher: &Option<Sender<Event>>,
    ) -> Result<(), ChainIndexError> {
        let chain_length = invariants::safe_block(&self.0, block)?;

        let mut wb = ChainIndexWriteBatch::new();
        wb.set_block(block, chain_length, false)?;
        self.write(wb);

        Event::InsertBlock(InsertBlockEvent {
            timestamp: SystemTime::now(),
            block: block.id,
            chain_length,
            date: block.date,
        })
        .publish(event_publisher);

        Ok(())
    }

    /// Make the already-indexed `new_tip` the tip of the canonical chain.
    ///
    /// Blocks on the old canonical chain above the fork point lose their canonical flag, and blocks on
    /// the branch from the fork point to `new_tip` gain it. Both changes and the new tip are written in
    /// one batch.
    pub fn set_tip(
        &mut self,
        new_tip: &BlockId,
        event_publisher: &Option<Sender<Event>>,
    ) -> Result<TipUpdate, ChainIndexError> {
        if self.0.block_chain_length(new_tip)?.is_none() {
            return Err(ChainIndexError::UnknownBlock { block: *new_tip });
        }

        let (fork_point, mut applied) = invariants::branch_to_canonical(&self.0, new_tip)?;
        let rolled_back = invariants::canonical_above(&self.0, &fork_point)?;

        let mut wb = ChainIndexWriteBatch::new();
        for block in &rolled_back {
            wb.set_canonical(block, false)?;
        }
        for block in &applied {
            wb.set_canonical(block, true)?;
        }
        wb.set_tip(new_tip)?;
        self.write(wb);

        applied.reverse();
        let update = TipUpdate {
            tip: *new_tip,
            fork_point,
            rolled_back,
            applied,
        };
        Self::publish_update_tip_event(event_publisher, &update);

        Ok(update)
    }

    /// Admit `block` and make it the canonical tip in one atomic write.
    ///
    /// If `block` extends the current tip this is a plain extension; otherwise it is a reorg onto the
    /// branch that `block` heads.
    pub fn append(
        &mut self,
        block: &Block,
        event_publisher: &Option<Sender<Event>>,
    ) -> Result<TipUpdate, ChainIndexError> {
        let chain_length = invariants::safe_block(&self.0, block)?;
        // Safety: safe_block rejects parentless blocks.
        let parent = block
            .parent
            .ok_or(ChainIndexError::MissingParent { block: block.id })?;

        let (fork_point, mut applied) = invariants::branch_to_canonical(&self.0, &parent)?;
        let rolled_back = invariants::canonical_above(&self.0, &fork_point)?;

        let mut wb = ChainIndexWriteBatch::new();
        wb.set_block(block, chain_length, true)?;
        for b in &rolled_back {
            wb.set_canonical(b, false)?;
        }
        for b in &applied {
            wb.set_canonical(b, true)?;
        }
        wb.set_tip(&block.id)?;
        self.write(wb);

        Event::InsertBlock(InsertBlockEvent {
            timestamp: SystemTime::now(),
            block: block.id,
            chain_length,
            date: block.date,
        })
        .publish(event_publisher);

        applied.reverse();
        applied.push(block.id);
        let update = TipUpdate {
            tip: block.id,
            fork_point,
            rolled_back,
            applied,
        };
        Self::publish_update_tip_event(event_publisher, &update);

        Ok(update)
    }

    /// Invariant: this method must only be invoked after the associated changes are persistently
    /// written to the [`ChainIndexSingleton`].
    fn publish_update_tip_event(event_publisher: &Option<Sender<Event>>, update: &TipUpdate) {
        Event::UpdateTip(UpdateTipEvent {
            timestamp: SystemTime::now(),
            tip: update.tip,
            fork_point: update.fork_point,
            rolled_back: update.rolled_back.len(),
            applied: update.applied.len(),
        })
        .publish(event_publisher)
    }
}

/// "Basic" state getters.
///
/// The same getters are defined on [`ChainIndexSnapshot`](super::public::ChainIndexSnapshot).
impl<K: KVStore> ChainIndexSingleton<K> {
    pub fn tip(&self) -> Result<BlockId, ChainIndexError> {
        self.0.tip()?.ok_or(ChainIndexError::EmptyChain)
    }

    pub fn meta_of(&self, block: &BlockId) -> Result<BlockMeta, ChainIndexError> {
        self.0
            .block_meta(block)?
            .ok_or(ChainIndexError::UnknownBlock { block: *block })
    }

    pub fn contains(&self, block: &BlockId) -> Result<bool, ChainIndexError> {
        Ok(self.0.block_chain_length(block)?.is_some())
    }
}

/// Summary of a change of the canonical tip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TipUpdate {
    /// The new tip.
    pub tip: BlockId,

    /// Newest block shared by the old and the new canonical chain.
    pub fork_point: BlockId,

    /// Blocks that left the canonical chain, newest first.
    pub rolled_back: Vec<BlockId>,

    /// Blocks that joined the canonical chain, oldest first.
    pub applied: Vec<BlockId>,
}

impl TipUpdate {
    /// Whether the update removed any block from the canonical chain.
    pub fn is_reorg(&self) -> bool {
        !self.rolled_back.is_empty()
    }
}

/// Error when reading or mutating the chain index.
#[derive(Debug)]
pub enum ChainIndexError {
    /// Error when trying to get a value from the chain index's underlying [key value store][KVStore].
    KVGetError(KVGetError),

    /// Error when trying to set a value into the chain index's underlying key value store.
    KVSetError(KVSetError),

    /// The requested block is not indexed.
    UnknownBlock { block: BlockId },

    /// No genesis block has been admitted yet.
    EmptyChain,

    /// None of the candidate ids is an indexed, canonical block.
    NoCommonAncestor,

    /// A block's parent is not indexed.
    UnknownParent { block: BlockId, parent: BlockId },

    /// A non-genesis block was submitted without a parent.
    MissingParent { block: BlockId },

    /// A block with the same id is already indexed.
    DuplicateBlock { block: BlockId },

    /// A block's date is not strictly greater than its parent's.
    NonIncreasingDate {
        block: BlockId,
        date: ChainDate,
        parent_date: ChainDate,
    },

    /// `initialize` was called on a chain index that already has a genesis block.
    AlreadyInitialized,

    /// The block given to `initialize` has a parent.
    GenesisWithParent { block: BlockId, parent: BlockId },

    /// Unable to find a block with the specific `BlockId`, even though an invariant that the chain index
    /// expects to be maintained suggests that the block should exist. This signals storage corruption.
    BlockExpectedButNotFound { block: BlockId },
}

impl Display for ChainIndexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ChainIndexError::KVGetError(err) => write!(f, "storage read failed: {}", err),
            ChainIndexError::KVSetError(err) => write!(f, "storage write failed: {}", err),
            ChainIndexError::UnknownBlock { block } => write!(f, "unknown block {}", block),
            ChainIndexError::EmptyChain => write!(f, "the chain has no genesis block"),
            ChainIndexError::NoCommonAncestor => {
                write!(f, "no candidate is a known canonical block")
            }
            ChainIndexError::UnknownParent { block, parent } => {
                write!(f, "parent {} of block {} is unknown", parent, block)
            }
            ChainIndexError::MissingParent { block } => {
                write!(f, "non-genesis block {} has no parent", block)
            }
            ChainIndexError::DuplicateBlock { block } => {
                write!(f, "block {} is already indexed", block)
            }
            ChainIndexError::NonIncreasingDate {
                block,
                date,
                parent_date,
            } => write!(
                f,
                "block {} has date {} which does not follow its parent's date {}",
                block, date, parent_date
            ),
            ChainIndexError::AlreadyInitialized => write!(f, "the chain index is already initialized"),
            ChainIndexError::GenesisWithParent { block, parent } => {
                write!(f, "genesis block {} has parent {}", block, parent)
            }
            ChainIndexError::BlockExpectedButNotFound { block } => {
                write!(f, "block {} expected but not found", block)
            }
        }
    }
}

impl std::error::Error for ChainIndexError {}

impl From<KVGetError> for ChainIndexError {
    fn from(value: KVGetError) -> Self {
        ChainIndexError::KVGetError(value)
    }
}

impl From<KVSetError> for ChainIndexError {
    fn from(value: KVSetError) -> Self {
        ChainIndexError::KVSetError(value)
    }
}

pub struct ChainIndexWriteBatch<W: WriteBatch>(pub(super) W);

impl<W: WriteBatch> ChainIndexWriteBatch<W> {
    pub(crate) fn new() -> ChainIndexWriteBatch<W> {
        ChainIndexWriteBatch(W::new())
    }

    /* ↓↓↓ Block ↓↓↓  */

    pub fn set_block(
        &mut self,
        block: &Block,
        chain_length: ChainLength,
        is_canonical: bool,
    ) -> Result<(), KVSetError> {
        let id = block.id.bytes();

        self.0.set(
            &block_field(&id, &variables::BLOCK_PARENT),
            &block
                .parent
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::BlockParent { block: block.id },
                    source: err,
                })?,
        );
        self.0.set(
            &block_field(&id, &variables::BLOCK_CHAIN_LENGTH),
            &chain_length
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::BlockChainLength { block: block.id },
                    source: err,
                })?,
        );
        self.0.set(
            &block_field(&id, &variables::BLOCK_DATE),
            &block
                .date
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::BlockDate { block: block.id },
                    source: err,
                })?,
        );
        self.set_canonical(&block.id, is_canonical)?;
        self.0
            .set(&block_field(&id, &variables::BLOCK_CONTENT), &block.content);

        Ok(())
    }

    pub fn set_canonical(&mut self, block: &BlockId, is_canonical: bool) -> Result<(), KVSetError> {
        self.0.set(
            &block_field(&block.bytes(), &variables::BLOCK_CANONICAL),
            &is_canonical
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::BlockCanonical { block: *block },
                    source: err,
                })?,
        );
        Ok(())
    }

    /* ↓↓↓ Tip ↓↓↓ */

    pub fn set_tip(&mut self, block: &BlockId) -> Result<(), KVSetError> {
        self.0.set(
            &variables::TIP,
            &block
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::Tip,
                    source: err,
                })?,
        );
        Ok(())
    }
}

/// Error when trying to serialize a value before setting it into the key value store.
#[derive(Debug)]
pub enum KVSetError {
    SerializeValueError { key: Key, source: std::io::Error },
}

impl Display for KVSetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            KVSetError::SerializeValueError { key, source } => {
                write!(f, "failed to serialize {}: {}", key, source)
            }
        }
    }
}

/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The authoritative record of which blocks a node knows and which of them form the canonical chain.
//!
//! # The Chain Index
//!
//! The chain index maps every admitted [`BlockId`](crate::types::data_types::BlockId) to its
//! [`BlockMeta`](crate::types::block::BlockMeta): parent, chain length, date, and whether the block
//! is on the canonical chain. Blocks only link backwards, to their parent. There is no forward (child)
//! index; walking forward is done by walking backward from the tip and reversing.
//!
//! Among all admitted blocks, exactly one linear path from genesis to the **tip** carries the canonical
//! flag. Blocks off that path are kept, because a later reorg may bring them back.
//!
//! # Pluggable persistence
//!
//! - The chain index is kept in persistent storage chosen by the library user.
//! - The user's storage must offer the abstract functionality of a key-value store with atomic, batched
//!   writes and consistent snapshots; see [`pluggables`].
//! - Where each variable lives in that store is documented in [`variables`].
//!
//! # Accessing the Chain Index
//!
//! - [`accessors::internal::ChainIndexSingleton`] is the only handle that can mutate the chain index.
//!   Mutations are serialized by owning it exclusively (the [`SyncService`](crate::service::SyncService)
//!   keeps it behind a mutex).
//! - [`accessors::public::ChainIndexCamera`] hands out read-only snapshots to any number of readers.
//!
//! # Stale reads
//!
//! Apart from the canonical flag, a block record is written exactly once, when the block is admitted,
//! and never deleted. A reader that captured a block id under one snapshot can therefore keep walking
//! parent links under later snapshots and still see the same ancestry, even if a reorg happened in
//! between. Streams built on the chain index rely on this.

pub mod accessors;

pub mod invariants;

pub mod pluggables;

pub mod variables;

/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Handles that put chain index variables in the right places of a [`KVStore`](super::pluggables::KVStore)
//! and read them back out.
//!
//! - [`internal::ChainIndexSingleton`]: the one read-write handle, owned by whoever admits blocks.
//! - [`public::ChainIndexCamera`]: a clonable factory of read-only [`public::ChainIndexSnapshot`]s.

pub mod internal;

pub mod public;

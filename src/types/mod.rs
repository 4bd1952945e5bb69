/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that are used across multiple components of the sync and relay core.

pub mod block;

pub mod data_types;

pub mod transaction;

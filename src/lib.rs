/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The synchronization and transaction-relay core that a blockchain node exposes to its peers.
//!
//! chainsync_rs answers the questions a peer asks while catching up with, and relaying transactions
//! to, a node:
//! - What is your tip? ([`Tip`](messages::TipRequest))
//! - Give me the blocks or headers behind this one. ([`GetBlocks`](messages::GetBlocksRequest),
//!   [`GetHeaders`](messages::GetHeadersRequest))
//! - Here is my frontier; send me everything I am missing, in order.
//!   ([`PullBlocksToTip`](messages::PullBlocksToTipRequest))
//! - Which of these transactions do you have? Here is one you don't.
//!   ([`ProposeTransactions`](messages::ProposeTransactionsRequest),
//!   [`RecordTransaction`](messages::RecordTransactionRequest))
//!
//! Encoding of blocks and transactions, signature and ledger checks, and storage are supplied by the
//! library user through the traits in [`codec`], [`ledger`], and
//! [`chain_index::pluggables`].

pub mod catch_up;

pub mod chain_index;

pub mod codec;

pub(crate) mod event_bus;

pub mod events;

pub mod ledger;

pub mod logging;

pub mod messages;

pub mod range_reader;

pub mod service;

pub mod stream;

pub mod tx_pool;

pub mod types;

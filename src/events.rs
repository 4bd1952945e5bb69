/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events emitted by the chain index and the sync service, for event handling and
//! logging.
//!
//! An event for a given action indicates that the action has been completed. Events are sent over an
//! [mpsc channel](std::sync::mpsc) to the [event bus](crate::event_bus), which invokes the
//! user-registered handlers and, if enabled, the default [loggers](crate::logging).

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::types::{
    data_types::{BlockId, ChainDate, ChainLength, PayloadKind, TransactionId},
    transaction::AcceptanceCode,
};

pub enum Event {
    // Events that change the chain index.
    InsertBlock(InsertBlockEvent),
    UpdateTip(UpdateTipEvent),
    // Events that involve serving a peer's request.
    ServeTip(ServeTipEvent),
    ServeRange(ServeRangeEvent),
    ServePull(ServePullEvent),
    // Transaction relay events.
    ProposeTransactions(ProposeTransactionsEvent),
    RecordTransaction(RecordTransactionEvent),
}

impl Event {
    pub(crate) fn publish(self, event_publisher: &Option<Sender<Event>>) {
        if let Some(event_publisher) = event_publisher {
            // The event bus may have been shut down before the last publisher was dropped.
            let _ = event_publisher.send(self);
        }
    }
}

/// A block was admitted to the chain index.
pub struct InsertBlockEvent {
    pub timestamp: SystemTime,
    pub block: BlockId,
    pub chain_length: ChainLength,
    pub date: ChainDate,
}

/// The canonical tip changed, possibly through a reorg.
pub struct UpdateTipEvent {
    pub timestamp: SystemTime,
    pub tip: BlockId,
    pub fork_point: BlockId,
    /// Number of blocks that left the canonical chain.
    pub rolled_back: usize,
    /// Number of blocks that joined the canonical chain.
    pub applied: usize,
}

pub struct ServeTipEvent {
    pub timestamp: SystemTime,
    pub tip: BlockId,
    pub date: ChainDate,
}

/// A range stream was handed out in response to a `GetBlocks` or `GetHeaders` request.
pub struct ServeRangeEvent {
    pub timestamp: SystemTime,
    pub anchor: BlockId,
    pub offset: u64,
    /// Size after capping by the configured range limit.
    pub size: u64,
    pub kind: PayloadKind,
}

/// A catch-up stream was handed out in response to a `PullBlocksToTip` request.
pub struct ServePullEvent {
    pub timestamp: SystemTime,
    pub ancestor: BlockId,
    pub tip: BlockId,
    pub blocks: usize,
}

pub struct ProposeTransactionsEvent {
    pub timestamp: SystemTime,
    pub proposed: usize,
    pub known: usize,
}

pub struct RecordTransactionEvent {
    pub timestamp: SystemTime,
    pub transaction: Option<TransactionId>,
    pub result: AcceptanceCode,
}

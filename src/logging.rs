/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the sync service's
//! [config](crate::service::Configuration).
//!
//! chainsync_rs logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how an [UpdateTip](crate::events::UpdateTipEvent) is printed:
//!
//! ```text
//! UpdateTip, 1701329264, Id5u7f6, fNGCJyk, 2, 3
//! ```
//!
//! In the snippet:
//! - The third value is the first seven characters of the Base64 encoding of the new tip's id.
//! - The fourth value is the first seven characters of the Base64 encoding of the fork point's id.
//! - The fifth and sixth values are the number of blocks rolled back and applied.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use log;
use std::time::SystemTime;

use crate::events::*;
use crate::types::data_types::PayloadKind;

// Names of each event in PascalCase for printing:
pub const INSERT_BLOCK: &str = "InsertBlock";
pub const UPDATE_TIP: &str = "UpdateTip";

pub const SERVE_TIP: &str = "ServeTip";
pub const SERVE_RANGE: &str = "ServeRange";
pub const SERVE_PULL: &str = "ServePull";

pub const PROPOSE_TRANSACTIONS: &str = "ProposeTransactions";
pub const RECORD_TRANSACTION: &str = "RecordTransaction";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for InsertBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |insert_block_event: &InsertBlockEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                INSERT_BLOCK,
                secs_since_unix_epoch(insert_block_event.timestamp),
                first_seven_base64_chars(&insert_block_event.block.bytes()),
                insert_block_event.chain_length,
                insert_block_event.date
            )
        };
        Box::new(logger)
    }
}

impl Logger for UpdateTipEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |update_tip_event: &UpdateTipEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                UPDATE_TIP,
                secs_since_unix_epoch(update_tip_event.timestamp),
                first_seven_base64_chars(&update_tip_event.tip.bytes()),
                first_seven_base64_chars(&update_tip_event.fork_point.bytes()),
                update_tip_event.rolled_back,
                update_tip_event.applied
            )
        };
        Box::new(logger)
    }
}

impl Logger for ServeTipEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |serve_tip_event: &ServeTipEvent| {
            log::info!(
                "{}, {}, {}, {}",
                SERVE_TIP,
                secs_since_unix_epoch(serve_tip_event.timestamp),
                first_seven_base64_chars(&serve_tip_event.tip.bytes()),
                serve_tip_event.date
            )
        };
        Box::new(logger)
    }
}

impl Logger for ServeRangeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |serve_range_event: &ServeRangeEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                SERVE_RANGE,
                secs_since_unix_epoch(serve_range_event.timestamp),
                payload_kind_name(serve_range_event.kind),
                first_seven_base64_chars(&serve_range_event.anchor.bytes()),
                serve_range_event.offset,
                serve_range_event.size
            )
        };
        Box::new(logger)
    }
}

impl Logger for ServePullEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |serve_pull_event: &ServePullEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                SERVE_PULL,
                secs_since_unix_epoch(serve_pull_event.timestamp),
                first_seven_base64_chars(&serve_pull_event.ancestor.bytes()),
                first_seven_base64_chars(&serve_pull_event.tip.bytes()),
                serve_pull_event.blocks
            )
        };
        Box::new(logger)
    }
}

impl Logger for ProposeTransactionsEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |propose_transactions_event: &ProposeTransactionsEvent| {
            log::info!(
                "{}, {}, {}, {}",
                PROPOSE_TRANSACTIONS,
                secs_since_unix_epoch(propose_transactions_event.timestamp),
                propose_transactions_event.proposed,
                propose_transactions_event.known
            )
        };
        Box::new(logger)
    }
}

impl Logger for RecordTransactionEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |record_transaction_event: &RecordTransactionEvent| {
            let transaction = match &record_transaction_event.transaction {
                Some(id) => first_seven_base64_chars(&id.bytes()),
                None => String::from("-"),
            };
            log::info!(
                "{}, {}, {}, {}",
                RECORD_TRANSACTION,
                secs_since_unix_epoch(record_transaction_event.timestamp),
                transaction,
                record_transaction_event.result
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

fn payload_kind_name(kind: PayloadKind) -> &'static str {
    match kind {
        PayloadKind::Block => "Blocks",
        PayloadKind::Header => "Headers",
    }
}

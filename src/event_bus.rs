/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Thread that receives [events](crate::events) and fires the handlers registered for them.
//!
//! Handlers come from two sources: the default [loggers](crate::logging), registered when
//! `log_events` is enabled, and user-defined closures registered through the
//! [service builder](crate::service::SyncServiceSpec).

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::events::*;
use crate::logging::Logger;

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

pub(crate) struct EventHandlers {
    pub(crate) insert_block_handlers: Vec<HandlerPtr<InsertBlockEvent>>,
    pub(crate) update_tip_handlers: Vec<HandlerPtr<UpdateTipEvent>>,
    pub(crate) serve_tip_handlers: Vec<HandlerPtr<ServeTipEvent>>,
    pub(crate) serve_range_handlers: Vec<HandlerPtr<ServeRangeEvent>>,
    pub(crate) serve_pull_handlers: Vec<HandlerPtr<ServePullEvent>>,
    pub(crate) propose_transactions_handlers: Vec<HandlerPtr<ProposeTransactionsEvent>>,
    pub(crate) record_transaction_handlers: Vec<HandlerPtr<RecordTransactionEvent>>,
}

impl EventHandlers {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        log_events: bool,
        on_insert_block: Option<HandlerPtr<InsertBlockEvent>>,
        on_update_tip: Option<HandlerPtr<UpdateTipEvent>>,
        on_serve_tip: Option<HandlerPtr<ServeTipEvent>>,
        on_serve_range: Option<HandlerPtr<ServeRangeEvent>>,
        on_serve_pull: Option<HandlerPtr<ServePullEvent>>,
        on_propose_transactions: Option<HandlerPtr<ProposeTransactionsEvent>>,
        on_record_transaction: Option<HandlerPtr<RecordTransactionEvent>>,
    ) -> EventHandlers {
        EventHandlers {
            insert_block_handlers: handlers(log_events, on_insert_block),
            update_tip_handlers: handlers(log_events, on_update_tip),
            serve_tip_handlers: handlers(log_events, on_serve_tip),
            serve_range_handlers: handlers(log_events, on_serve_range),
            serve_pull_handlers: handlers(log_events, on_serve_pull),
            propose_transactions_handlers: handlers(log_events, on_propose_transactions),
            record_transaction_handlers: handlers(log_events, on_record_transaction),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.insert_block_handlers.is_empty()
            && self.update_tip_handlers.is_empty()
            && self.serve_tip_handlers.is_empty()
            && self.serve_range_handlers.is_empty()
            && self.serve_pull_handlers.is_empty()
            && self.propose_transactions_handlers.is_empty()
            && self.record_transaction_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::InsertBlock(insert_block_event) => self
                .insert_block_handlers
                .iter()
                .for_each(|handler| handler(&insert_block_event)),

            Event::UpdateTip(update_tip_event) => self
                .update_tip_handlers
                .iter()
                .for_each(|handler| handler(&update_tip_event)),

            Event::ServeTip(serve_tip_event) => self
                .serve_tip_handlers
                .iter()
                .for_each(|handler| handler(&serve_tip_event)),

            Event::ServeRange(serve_range_event) => self
                .serve_range_handlers
                .iter()
                .for_each(|handler| handler(&serve_range_event)),

            Event::ServePull(serve_pull_event) => self
                .serve_pull_handlers
                .iter()
                .for_each(|handler| handler(&serve_pull_event)),

            Event::ProposeTransactions(propose_transactions_event) => self
                .propose_transactions_handlers
                .iter()
                .for_each(|handler| handler(&propose_transactions_event)),

            Event::RecordTransaction(record_transaction_event) => self
                .record_transaction_handlers
                .iter()
                .for_each(|handler| handler(&record_transaction_event)),
        }
    }
}

// The default logger goes first so that it prints before user handlers run.
fn handlers<T: Logger>(log_events: bool, user_handler: Option<HandlerPtr<T>>) -> Vec<HandlerPtr<T>> {
    let mut handlers = Vec::new();
    if log_events {
        handlers.push(T::get_logger());
    }
    if let Some(handler) = user_handler {
        handlers.push(handler);
    }
    handlers
}

/// Start the event bus thread.
///
/// The thread stops when it receives on `shutdown_signal`, or when every event publisher has been
/// dropped. Events already queued when shutdown is signalled are still handled.
pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                while let Ok(event) = event_subscriber.try_recv() {
                    event_handlers.fire_handlers(event)
                }
                return;
            }
            Err(TryRecvError::Empty) => (),
        }

        match event_subscriber.recv_timeout(Duration::from_millis(10)) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => return,
        }
    })
}

/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build, start, and drive the sync service that a node exposes to its peers.
//!
//! The [`SyncService`] is the node-side face of every call in the [messages](crate::messages) module.
//! It owns:
//! - The single writer of the [Chain Index](crate::chain_index), behind a mutex so that mutations are
//!   serialized, and a camera for readers.
//! - The [Transaction Relay Pool](crate::tx_pool).
//! - The [event bus](crate::event_bus) thread, if any event handler is registered.
//!
//! Reads (tip, ranges, catch-up, proposals) never take the writer's mutex, so they can run
//! concurrently with each other and with mutations.
//!
//! ## Starting a sync service
//!
//! ```ignore
//! let service =
//!     SyncServiceSpec::builder()
//!     .kv_store(kv_store)
//!     .block_codec(block_codec)
//!     .transaction_codec(transaction_codec)
//!     .ledger_validator(ledger_validator)
//!     .configuration(configuration)
//!     .on_update_tip(update_tip_handler)
//!     .build()
//!     .start();
//! ```
//!
//! ### Required setters
//!
//! - `.kv_store(...)`
//! - `.block_codec(...)`
//! - `.transaction_codec(...)`
//! - `.ledger_validator(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! The optional setters are for registering user-defined event handlers for events from
//! [crate::events]:
//! - `.on_insert_block(...)`
//! - `.on_update_tip(...)`
//! - `.on_serve_tip(...)`
//! - `.on_serve_range(...)`
//! - `.on_serve_pull(...)`
//! - `.on_propose_transactions(...)`
//! - `.on_record_transaction(...)`
//!
//! The service's [configuration](Configuration) is also built using the builder pattern:
//!
//! ```ignore
//! let configuration =
//!     Configuration::builder()
//!     .range_limit(1000)
//!     .pull_limit(500)
//!     .log_events(true)
//!     .build();
//! ```

use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::SystemTime;

use typed_builder::TypedBuilder;

use crate::catch_up::{self, PullStream};
use crate::chain_index::{
    accessors::{
        internal::{ChainIndexError, ChainIndexSingleton, TipUpdate},
        public::ChainIndexCamera,
    },
    pluggables::KVStore,
};
use crate::codec::{BlockCodec, TransactionCodec};
use crate::event_bus::*;
use crate::events::*;
use crate::ledger::LedgerValidator;
use crate::messages::*;
use crate::range_reader::{self, RangeStream};
use crate::stream::{load_payload, StreamError};
use crate::tx_pool::TransactionRelayPool;
use crate::types::{
    block::Block,
    data_types::{BlockId, Payload, PayloadKind},
    transaction::ProposalStatus,
};

/// Stores the user-defined parameters of the sync service, that is:
/// 1. The range limit, which caps the `size` of `GetBlocks` and `GetHeaders` requests.
/// 2. The pull limit, which caps the number of blocks streamed by one `PullBlocksToTip` request.
/// 3. The "Log Events" flag, if set to "true" then logs should be printed.
///
/// ## Limits
///
/// Requests over a limit are not rejected. Ranges are cut to `range_limit` blocks, counted from the
/// offset position. Catch-up streams are cut to the `pull_limit` blocks right after the common
/// ancestor, so that a peer can keep pulling from its new frontier.
///
/// ## Log Events
///
/// chainsync_rs logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
/// printed onto a terminal or to a file, set up a [logging
/// implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
#[derive(Clone, Debug, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.range_limit(...)`
    - `.pull_limit(...)`
    - `.log_events(...)`
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the maximum number of payloads streamed for one range request. Required."))]
    pub range_limit: u64,
    #[builder(setter(doc = "Set the maximum number of blocks streamed for one catch-up request. Required."))]
    pub pull_limit: u64,
    #[builder(setter(doc = "Enable logging? Required."))]
    pub log_events: bool,
}

/// Stores all necessary parameters and trait implementations required to run the [SyncService].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [SyncServiceSpec]. On the builder call the following methods to construct a valid [SyncServiceSpec].

    Required:
    - `.kv_store(...)`
    - `.block_codec(...)`
    - `.transaction_codec(...)`
    - `.ledger_validator(...)`
    - `.configuration(...)`

    Optional:
    - `.on_insert_block(...)`
    - `.on_update_tip(...)`
    - `.on_serve_tip(...)`
    - `.on_serve_range(...)`
    - `.on_serve_pull(...)`
    - `.on_propose_transactions(...)`
    - `.on_record_transaction(...)`
"))]
pub struct SyncServiceSpec<K, B, T, V>
where
    K: KVStore,
    B: BlockCodec,
    T: TransactionCodec,
    V: LedgerValidator<T::Transaction>,
{
    // Required parameters
    #[builder(setter(doc = "Set the implementation of the Key-Value store backing the chain index. The argument must implement the [KVStore](crate::chain_index::pluggables::KVStore) trait. Required."))]
    kv_store: K,
    #[builder(setter(doc = "Set the codec that serializes stored blocks into block and header payloads. Required."))]
    block_codec: B,
    #[builder(setter(doc = "Set the codec that decodes raw transactions submitted by peers. Required."))]
    transaction_codec: T,
    #[builder(setter(doc = "Set the validator that classifies newly submitted transactions. Required."))]
    ledger_validator: V,
    #[builder(setter(doc = "Set the [configuration](Configuration) of the service. Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(transform = |handler: impl Fn(&InsertBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<InsertBlockEvent>),
    doc = "Register a handler closure to be invoked after a block is admitted to the chain index. Optional."))]
    on_insert_block: Option<HandlerPtr<InsertBlockEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&UpdateTipEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<UpdateTipEvent>),
    doc = "Register a handler closure to be invoked after the canonical tip changes. Optional."))]
    on_update_tip: Option<HandlerPtr<UpdateTipEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ServeTipEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ServeTipEvent>),
    doc = "Register a handler closure to be invoked after the tip is reported to a peer. Optional."))]
    on_serve_tip: Option<HandlerPtr<ServeTipEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ServeRangeEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ServeRangeEvent>),
    doc = "Register a handler closure to be invoked after a range stream is handed out. Optional."))]
    on_serve_range: Option<HandlerPtr<ServeRangeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ServePullEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ServePullEvent>),
    doc = "Register a handler closure to be invoked after a catch-up stream is handed out. Optional."))]
    on_serve_pull: Option<HandlerPtr<ServePullEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ProposeTransactionsEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ProposeTransactionsEvent>),
    doc = "Register a handler closure to be invoked after a peer's transaction proposal is answered. Optional."))]
    on_propose_transactions: Option<HandlerPtr<ProposeTransactionsEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RecordTransactionEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RecordTransactionEvent>),
    doc = "Register a handler closure to be invoked after a submitted transaction is classified. Optional."))]
    on_record_transaction: Option<HandlerPtr<RecordTransactionEvent>>,
}

impl<K, B, T, V> SyncServiceSpec<K, B, T, V>
where
    K: KVStore,
    B: BlockCodec,
    T: TransactionCodec,
    V: LedgerValidator<T::Transaction>,
{
    /// Start the event bus (if any handler is registered) and return the running [SyncService].
    pub fn start(self) -> SyncService<K, B, T, V> {
        let event_handlers = EventHandlers::new(
            self.configuration.log_events,
            self.on_insert_block,
            self.on_update_tip,
            self.on_serve_tip,
            self.on_serve_range,
            self.on_serve_pull,
            self.on_propose_transactions,
            self.on_record_transaction,
        );

        let (event_bus, event_bus_shutdown, event_publisher) = if !event_handlers.is_empty() {
            let (event_publisher, event_subscriber) = mpsc::channel();
            let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
            let event_bus =
                start_event_bus(event_handlers, event_subscriber, event_bus_shutdown_receiver);
            (Some(event_bus), Some(event_bus_shutdown), Some(event_publisher))
        } else {
            (None, None, None)
        };

        SyncService {
            chain_index: Mutex::new(ChainIndexSingleton::new(self.kv_store.clone())),
            chain_index_camera: ChainIndexCamera::new(self.kv_store),
            block_codec: Arc::new(self.block_codec),
            relay_pool: TransactionRelayPool::new(self.transaction_codec, self.ledger_validator),
            configuration: self.configuration,
            event_publisher,
            event_bus,
            event_bus_shutdown,
        }
    }
}

/// A running sync service. When this value is dropped, the event bus thread is shut down after it has
/// handled the events already published.
pub struct SyncService<K, B, T, V>
where
    K: KVStore,
    B: BlockCodec,
    T: TransactionCodec,
    V: LedgerValidator<T::Transaction>,
{
    chain_index: Mutex<ChainIndexSingleton<K>>,
    chain_index_camera: ChainIndexCamera<K>,
    block_codec: Arc<B>,
    relay_pool: TransactionRelayPool<T, V>,
    configuration: Configuration,
    event_publisher: Option<Sender<Event>>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

/// Chain index mutations. Each one is serialized with the others and applied as one atomic write.
impl<K, B, T, V> SyncService<K, B, T, V>
where
    K: KVStore,
    B: BlockCodec,
    T: TransactionCodec,
    V: LedgerValidator<T::Transaction>,
{
    /// Admit `genesis` as the first canonical block.
    pub fn initialize(&self, genesis: &Block) -> Result<(), ChainIndexError> {
        self.chain_index().initialize(genesis, &self.event_publisher)
    }

    /// Admit `block` without changing the canonical chain.
    pub fn insert_block(&self, block: &Block) -> Result<(), ChainIndexError> {
        self.chain_index().insert_block(block, &self.event_publisher)
    }

    /// Make the already-admitted `block` the canonical tip. The fork choice is the caller's.
    pub fn set_tip(&self, block: &BlockId) -> Result<TipUpdate, ChainIndexError> {
        self.chain_index().set_tip(block, &self.event_publisher)
    }

    /// Admit `block` and make it the canonical tip. Publishes an `InsertBlock` event followed by an
    /// `UpdateTip` event.
    pub fn append(&self, block: &Block) -> Result<TipUpdate, ChainIndexError> {
        self.chain_index().append(block, &self.event_publisher)
    }

    // Mutations write whole batches, so a panic in another holder cannot leave a torn chain index.
    fn chain_index(&self) -> MutexGuard<'_, ChainIndexSingleton<K>> {
        self.chain_index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Calls served to peers.
impl<K, B, T, V> SyncService<K, B, T, V>
where
    K: KVStore,
    B: BlockCodec,
    T: TransactionCodec,
    V: LedgerValidator<T::Transaction>,
{
    /// `Tip`: the canonical tip and its date.
    pub fn tip(&self, _request: TipRequest) -> Result<TipResponse, ChainIndexError> {
        let tip = self.chain_index_camera.snapshot().tip_meta()?;

        Event::ServeTip(ServeTipEvent {
            timestamp: SystemTime::now(),
            tip: tip.id,
            date: tip.date,
        })
        .publish(&self.event_publisher);

        Ok(TipResponse::new(tip.id, tip.date))
    }

    /// `TipHeader`: the header payload of the canonical tip.
    pub fn tip_header(&self, _request: TipHeaderRequest) -> Result<Payload, StreamError> {
        let tip = self.chain_index_camera.snapshot().tip()?;
        let (_, header) = load_payload(
            &self.chain_index_camera,
            self.block_codec.as_ref(),
            &tip,
            PayloadKind::Header,
        )?;
        Ok(header)
    }

    /// `GetBlocks`: full blocks from `request.offset` parent links behind `request.from`, towards
    /// genesis.
    pub fn get_blocks(
        &self,
        request: GetBlocksRequest,
    ) -> Result<RangeStream<K, B>, ChainIndexError> {
        self.serve_range(&request.from, request.offset, request.size, PayloadKind::Block)
    }

    /// `GetHeaders`: same as [`get_blocks`](Self::get_blocks), for headers.
    pub fn get_headers(
        &self,
        request: GetHeadersRequest,
    ) -> Result<RangeStream<K, B>, ChainIndexError> {
        self.serve_range(&request.from, request.offset, request.size, PayloadKind::Header)
    }

    /// `PullBlocksToTip`: the canonical blocks after the first known canonical id in `request.from`,
    /// oldest first.
    pub fn pull_blocks_to_tip(
        &self,
        request: PullBlocksToTipRequest,
    ) -> Result<PullStream<K, B>, ChainIndexError> {
        let stream = catch_up::pull_to_tip(
            &self.chain_index_camera,
            self.block_codec.clone(),
            &request.from,
            Some(self.configuration.pull_limit),
        )?;

        Event::ServePull(ServePullEvent {
            timestamp: SystemTime::now(),
            ancestor: *stream.ancestor(),
            tip: *stream.tip(),
            blocks: stream.remaining(),
        })
        .publish(&self.event_publisher);

        Ok(stream)
    }

    /// `ProposeTransactions`: which of `request.ids` this node already has.
    pub fn propose_transactions(
        &self,
        request: ProposeTransactionsRequest,
    ) -> ProposeTransactionsResponse {
        let statuses = self.relay_pool.propose(&request.ids);

        Event::ProposeTransactions(ProposeTransactionsEvent {
            timestamp: SystemTime::now(),
            proposed: statuses.len(),
            known: statuses
                .iter()
                .filter(|(_, status)| *status == ProposalStatus::Known)
                .count(),
        })
        .publish(&self.event_publisher);

        statuses.into()
    }

    /// `RecordTransaction`: decode, deduplicate and classify a raw transaction.
    pub fn record_transaction(&self, request: RecordTransactionRequest) -> RecordTransactionResponse {
        let outcome = self.relay_pool.record(&request.tx);

        Event::RecordTransaction(RecordTransactionEvent {
            timestamp: SystemTime::now(),
            transaction: outcome.id,
            result: outcome.result,
        })
        .publish(&self.event_publisher);

        outcome.into()
    }

    fn serve_range(
        &self,
        anchor: &BlockId,
        offset: u64,
        size: u64,
        kind: PayloadKind,
    ) -> Result<RangeStream<K, B>, ChainIndexError> {
        let size = size.min(self.configuration.range_limit);
        let stream = range_reader::read(
            &self.chain_index_camera,
            self.block_codec.clone(),
            anchor,
            offset,
            size,
            kind,
        )?;

        Event::ServeRange(ServeRangeEvent {
            timestamp: SystemTime::now(),
            anchor: *anchor,
            offset,
            size,
            kind,
        })
        .publish(&self.event_publisher);

        Ok(stream)
    }
}

/// Accessors.
impl<K, B, T, V> SyncService<K, B, T, V>
where
    K: KVStore,
    B: BlockCodec,
    T: TransactionCodec,
    V: LedgerValidator<T::Transaction>,
{
    /// Returns a [camera](ChainIndexCamera) which can be used to peek into the chain index.
    pub fn chain_index_camera(&self) -> &ChainIndexCamera<K> {
        &self.chain_index_camera
    }

    pub fn relay_pool(&self) -> &TransactionRelayPool<T, V> {
        &self.relay_pool
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }
}

impl<K, B, T, V> Drop for SyncService<K, B, T, V>
where
    K: KVStore,
    B: BlockCodec,
    T: TransactionCodec,
    V: LedgerValidator<T::Transaction>,
{
    fn drop(&mut self) {
        // Dropping the publisher first lets the bus drain and exit even if the shutdown signal is lost.
        self.event_publisher.take();
        if let Some(shutdown) = self.event_bus_shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(event_bus) = self.event_bus.take() {
            if event_bus.join().is_err() {
                log::error!("event bus thread panicked");
            }
        }
    }
}

/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The Transaction Relay Pool: deduplication and classification of transactions relayed by peers.
//!
//! # Proposing and recording
//!
//! Peers first *propose* transaction ids, to learn which of them this node already has
//! ([`propose`](TransactionRelayPool::propose)), and then *record* the raw transactions the node is
//! missing ([`record`](TransactionRelayPool::record)). Recording decodes the transaction through the
//! node's [`TransactionCodec`] and asks the node's [`LedgerValidator`] for a verdict, which becomes the
//! transaction's [`AcceptanceCode`].
//!
//! # Record lifecycle
//!
//! ```text
//!               ┌──────────▶ Accepted
//!  Validating ──┤
//!               └──────────▶ Rejected(code)
//! ```
//!
//! A record is created in the `Validating` state by the first caller to submit its id, and is moved to
//! a terminal state when that caller's validation finishes. Terminal records never change:
//! resubmitting an accepted transaction reports `ALREADY_EXISTS`, and resubmitting a rejected one
//! reports the stored rejection code. Validation never runs twice for the same id.
//!
//! # Single validation winner
//!
//! The `Validating` placeholder is inserted with insert-if-absent under the pool's lock, so exactly one
//! concurrent caller wins the right to validate. Losers wait on a condition variable until the
//! winner's record becomes terminal. If the validator panics, the placeholder is removed again and one
//! of the waiters takes over.

use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::codec::TransactionCodec;
use crate::ledger::{LedgerValidator, ValidateTransactionRequest};
use crate::types::{
    data_types::TransactionId,
    transaction::{AcceptanceCode, ProposalStatus, RecordOutcome, TransactionRecord, TransactionState},
};

pub struct TransactionRelayPool<C: TransactionCodec, V: LedgerValidator<C::Transaction>> {
    codec: C,
    validator: V,
    records: Mutex<HashMap<TransactionId, TransactionState>>,
    settled: Condvar,
}

impl<C: TransactionCodec, V: LedgerValidator<C::Transaction>> TransactionRelayPool<C, V> {
    pub fn new(codec: C, validator: V) -> Self {
        Self {
            codec,
            validator,
            records: Mutex::new(HashMap::new()),
            settled: Condvar::new(),
        }
    }

    /// Report, for each id in `ids`, whether the pool already holds a record for it.
    ///
    /// Records still being validated count as known. Each id appears in the output exactly once, at the
    /// position of its first occurrence in `ids`.
    pub fn propose(&self, ids: &[TransactionId]) -> Vec<(TransactionId, ProposalStatus)> {
        let records = self.lock();
        let mut seen = HashSet::with_capacity(ids.len());
        ids.iter()
            .filter(|id| seen.insert(**id))
            .map(|id| {
                let status = if records.contains_key(id) {
                    ProposalStatus::Known
                } else {
                    ProposalStatus::Unknown
                };
                (*id, status)
            })
            .collect()
    }

    /// Decode, deduplicate and (at most once per id) validate a raw transaction.
    ///
    /// Rejections are terminal: a rejected id reports its stored code on every resubmission and is never
    /// validated again.
    pub fn record(&self, raw: &[u8]) -> RecordOutcome {
        let transaction = match self.codec.decode_transaction(raw) {
            Ok(transaction) => transaction,
            Err(err) => {
                log::debug!("rejecting undecodable transaction: {}", err);
                return RecordOutcome::new(AcceptanceCode::TransactionError, None);
            }
        };
        let id = self.codec.transaction_id(&transaction);

        if let Some(result) = self.settled_or_claim(&id) {
            return RecordOutcome::new(result, Some(id));
        }

        let mut claim = Claim {
            pool: self,
            id,
            settled: false,
        };
        let response = self
            .validator
            .validate_transaction(ValidateTransactionRequest::new(id, &transaction));
        let result = response.acceptance_code();
        claim.settle(if result.is_success() {
            TransactionState::Accepted
        } else {
            TransactionState::Rejected(result)
        });

        RecordOutcome::new(result, Some(id))
    }

    /// Get the state of the record for `id`, if there is one.
    pub fn status(&self, id: &TransactionId) -> Option<TransactionState> {
        self.lock().get(id).copied()
    }

    /// Get the record for `id`, if there is one.
    pub fn record_of(&self, id: &TransactionId) -> Option<TransactionRecord> {
        self.status(id).map(|state| TransactionRecord { id: *id, state })
    }

    /// Number of records in the pool, including those being validated.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }

    /// Ids of every accepted transaction, in no particular order.
    pub fn accepted_ids(&self) -> Vec<TransactionId> {
        self.lock()
            .iter()
            .filter(|(_, state)| **state == TransactionState::Accepted)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Either return the result a terminal record for `id` dictates, or insert the `Validating`
    /// placeholder for `id` and return `None`, in which case the caller must validate.
    fn settled_or_claim(&self, id: &TransactionId) -> Option<AcceptanceCode> {
        let mut records = self.lock();
        loop {
            match records.get(id) {
                Some(TransactionState::Accepted) => return Some(AcceptanceCode::AlreadyExists),
                Some(TransactionState::Rejected(code)) => return Some(*code),
                Some(TransactionState::Validating) => {
                    records = self
                        .settled
                        .wait(records)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                None => {
                    records.insert(*id, TransactionState::Validating);
                    return None;
                }
            }
        }
    }

    // The map is consistent after every critical section, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<TransactionId, TransactionState>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The right to validate one transaction, held by the caller that inserted its placeholder.
///
/// Dropping an unsettled claim removes the placeholder, so that waiters are not left hanging.
struct Claim<'a, C: TransactionCodec, V: LedgerValidator<C::Transaction>> {
    pool: &'a TransactionRelayPool<C, V>,
    id: TransactionId,
    settled: bool,
}

impl<'a, C: TransactionCodec, V: LedgerValidator<C::Transaction>> Claim<'a, C, V> {
    fn settle(&mut self, state: TransactionState) {
        self.pool.lock().insert(self.id, state);
        self.settled = true;
        self.pool.settled.notify_all();
    }
}

impl<'a, C: TransactionCodec, V: LedgerValidator<C::Transaction>> Drop for Claim<'a, C, V> {
    fn drop(&mut self) {
        if !self.settled {
            self.pool.lock().remove(&self.id);
            self.pool.settled.notify_all();
        }
    }
}

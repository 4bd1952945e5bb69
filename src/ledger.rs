/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`LedgerValidator`] trait: signature and ledger-state checks applied to submitted transactions.
//!
//! The relay pool never judges a transaction itself. It asks the node's validator exactly once per
//! transaction id, and maps the answer onto an [`AcceptanceCode`](crate::types::transaction::AcceptanceCode):
//!
//! |Response|Acceptance code|
//! |---|---|
//! |[`Valid`](ValidateTransactionResponse::Valid)|`ACCEPTED`|
//! |[`InvalidSignature`](ValidateTransactionResponse::InvalidSignature)|`INVALID_SIGNATURE`|
//! |[`DoubleSpend`](ValidateTransactionResponse::DoubleSpend)|`DOUBLE_SPEND`|
//! |[`Invalid`](ValidateTransactionResponse::Invalid)|`TRANSACTION_ERROR`|
//!
//! Implementations are expected to be *deterministic* relative to the ledger state they check against:
//! given the same transaction and the same ledger state, they should give the same answer.

use crate::types::{data_types::TransactionId, transaction::AcceptanceCode};

pub trait LedgerValidator<T>: Send + Sync + 'static {
    /// Called by the relay pool when a transaction is submitted for the first time.
    fn validate_transaction(
        &self,
        request: ValidateTransactionRequest<'_, T>,
    ) -> ValidateTransactionResponse;
}

/// Request for the validator to validate a decoded transaction.
pub struct ValidateTransactionRequest<'a, T> {
    id: TransactionId,
    transaction: &'a T,
}

impl<'a, T> ValidateTransactionRequest<'a, T> {
    pub(crate) fn new(id: TransactionId, transaction: &'a T) -> Self {
        Self { id, transaction }
    }

    /// Id of the transaction, as reported by the codec.
    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn transaction(&self) -> &T {
        self.transaction
    }
}

/// Verdict of a [`LedgerValidator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidateTransactionResponse {
    Valid,
    InvalidSignature,
    DoubleSpend,
    /// Any other validation failure.
    Invalid { reason: String },
}

impl ValidateTransactionResponse {
    pub fn acceptance_code(&self) -> AcceptanceCode {
        match self {
            ValidateTransactionResponse::Valid => AcceptanceCode::Accepted,
            ValidateTransactionResponse::InvalidSignature => AcceptanceCode::InvalidSignature,
            ValidateTransactionResponse::DoubleSpend => AcceptanceCode::DoubleSpend,
            ValidateTransactionResponse::Invalid { .. } => AcceptanceCode::TransactionError,
        }
    }
}
